use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{is_url, ResolveRequest, ResolvedStream, Resolver};
use crate::error::{PlayerError, PlayerResult};

/// Resolves locators and search queries by shelling out to yt-dlp.
pub struct YtDlpResolver {
    binary: String,
    rate_limiter: Semaphore,
}

/// Subset of `yt-dlp --dump-json` output we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    extractor_key: Option<String>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            // Limit concurrent yt-dlp processes to avoid rate limiting
            rate_limiter: Semaphore::new(3),
        }
    }

    fn build_args(request: &ResolveRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--dump-json",
            "--skip-download",
            "--no-warnings",
            "-f",
            "bestaudio/best",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(credentials) = &request.credentials {
            args.push("--cookies".to_string());
            args.push(credentials.path.display().to_string());
        }

        if is_url(&request.query) {
            args.push(request.query.clone());
        } else {
            args.push(format!("ytsearch1:{}", request.query));
        }
        args
    }

    fn parse_info(stdout: &str) -> PlayerResult<ResolvedStream> {
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| PlayerError::ResolutionFailure("yt-dlp returned no results".into()))?;

        let info: YtDlpInfo = serde_json::from_str(line)
            .map_err(|e| PlayerError::ResolutionFailure(format!("unreadable yt-dlp output: {e}")))?;

        let stream_url = info
            .url
            .ok_or_else(|| PlayerError::ResolutionFailure("yt-dlp did not report a stream url".into()))?;

        Ok(ResolvedStream {
            stream_url,
            title: info
                .title
                .or(info.fulltitle)
                .or(info.webpage_url)
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: info.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
            provider: info
                .extractor_key
                .map(|k| k.to_ascii_lowercase())
                .unwrap_or_else(|| "source".to_string()),
        })
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, request: ResolveRequest) -> PlayerResult<ResolvedStream> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlayerError::ResolutionFailure(e.to_string()))?;

        debug!("📊 Resolving {} for guild {}", request.query, request.guild_id);

        let output = Command::new(&self.binary)
            .args(Self::build_args(&request))
            .output()
            .await
            .map_err(|e| PlayerError::ResolutionFailure(format!("could not run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::ResolutionFailure(error.trim().to_string()));
        }

        let stream = Self::parse_info(&String::from_utf8_lossy(&output.stdout))?;
        info!("🎯 Resolved: {} ({})", stream.title, stream.provider);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::CredentialHandle;
    use pretty_assertions::assert_eq;
    use serenity::model::id::GuildId;
    use std::path::PathBuf;

    #[test]
    fn test_parse_info() {
        let stdout = r#"{"title":"Song","url":"https://cdn.example.com/a.webm","webpage_url":"https://youtube.com/watch?v=a","duration":201.6,"extractor_key":"Youtube"}"#;
        let stream = YtDlpResolver::parse_info(stdout).unwrap();
        assert_eq!(
            stream,
            ResolvedStream {
                stream_url: "https://cdn.example.com/a.webm".into(),
                title: "Song".into(),
                duration: Some(202),
                provider: "youtube".into(),
            }
        );
    }

    #[test]
    fn test_parse_info_errors() {
        assert!(matches!(
            YtDlpResolver::parse_info("\n"),
            Err(PlayerError::ResolutionFailure(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_info(r#"{"title":"no stream"}"#),
            Err(PlayerError::ResolutionFailure(_))
        ));
    }

    #[test]
    fn test_build_args_search_and_cookies() {
        let request = ResolveRequest {
            query: "lofi beats".into(),
            guild_id: GuildId::new(1),
            credentials: Some(CredentialHandle {
                provider: "youtube".into(),
                path: PathBuf::from("/tmp/cookies.txt"),
            }),
        };
        let args = YtDlpResolver::build_args(&request);
        assert_eq!(args.last().unwrap(), "ytsearch1:lofi beats");
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "/tmp/cookies.txt");

        let request = ResolveRequest {
            query: "https://youtu.be/x".into(),
            credentials: None,
            ..request
        };
        let args = YtDlpResolver::build_args(&request);
        assert_eq!(args.last().unwrap(), "https://youtu.be/x");
        assert!(!args.iter().any(|a| a == "--cookies"));
    }
}
