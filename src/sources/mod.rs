//! Media collaborators: turning a locator or query into a stream, and a
//! stream into a playable audio source.
//!
//! The player only talks to the [`Resolver`], [`SourceFactory`] and
//! [`CredentialStore`] traits. [`YtDlpResolver`], [`HttpSourceFactory`] and
//! [`CookieDirectory`] are the implementations used in production.

pub mod cookies;
pub mod http;
pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::{any::Any, fmt, future::Future, path::PathBuf, time::Duration};
use tracing::warn;

use crate::error::{PlayerError, PlayerResult};

pub use cookies::CookieDirectory;
pub use http::HttpSourceFactory;
pub use ytdlp::YtDlpResolver;

/// Credentials (a cookies file) a resolver may use for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHandle {
    pub provider: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// URL or free-text query.
    pub query: String,
    pub guild_id: GuildId,
    pub credentials: Option<CredentialHandle>,
}

/// A playable stream as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub stream_url: String,
    pub title: String,
    pub duration: Option<u64>,
    pub provider: String,
}

/// Looks up the playable stream behind a locator or query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, request: ResolveRequest) -> PlayerResult<ResolvedStream>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub stream_url: String,
    /// 0..=100
    pub volume: u8,
    pub seek: Option<Duration>,
}

/// Playback parameters travelling with an [`AudioSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceParams {
    pub stream_url: String,
    pub volume: u8,
    pub seek: Option<Duration>,
}

/// A source ready to hand to a voice session.
///
/// The frames are type-erased so the core does not depend on any particular
/// transport; a session recovers its own frame type with
/// [`AudioSource::into_frames`].
pub struct AudioSource {
    params: SourceParams,
    frames: Box<dyn Any + Send>,
}

impl AudioSource {
    pub fn new<F: Any + Send>(request: &SourceRequest, frames: F) -> Self {
        Self {
            params: SourceParams {
                stream_url: request.stream_url.clone(),
                volume: request.volume,
                seek: request.seek,
            },
            frames: Box::new(frames),
        }
    }

    pub fn params(&self) -> &SourceParams {
        &self.params
    }

    pub fn into_frames<F: Any>(self) -> PlayerResult<(F, SourceParams)> {
        match self.frames.downcast::<F>() {
            Ok(frames) => Ok((*frames, self.params)),
            Err(_) => Err(PlayerError::VoiceTransport(format!(
                "audio source for {} was built for a different transport",
                self.params.stream_url
            ))),
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSource").field("params", &self.params).finish_non_exhaustive()
    }
}

/// Builds playable sources. Implementations retry transient failures a
/// bounded number of times before giving up with
/// [`PlayerError::SourceConstructionFailure`].
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn create(&self, request: SourceRequest) -> PlayerResult<AudioSource>;
}

/// Per-guild credential lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credentials_for(&self, guild_id: GuildId, provider: &str) -> Option<CredentialHandle>;
}

/// Provider tag used to pick credentials for a locator.
pub fn provider_for(locator: &str) -> &'static str {
    let host = url::Url::parse(locator)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

    match host {
        Some(host) if host == "facebook.com" || host.ends_with(".facebook.com") || host == "fb.watch" => "facebook",
        _ => "youtube",
    }
}

pub fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

/// Runs `op` up to `attempts` times, sleeping `backoff * attempt` between
/// failures. The last error becomes a `SourceConstructionFailure`.
pub async fn with_retries<T, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> PlayerResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("🔄 Attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = e;
                if attempt < attempts {
                    tokio::time::sleep(backoff * attempt).await;
                }
            }
        }
    }

    Err(PlayerError::SourceConstructionFailure(last_error))
}
