use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::storage::{GuildSettings, IDLE_MINUTES_RANGE, MAX_QUEUE_SIZE_RANGE};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    // Paths
    pub data_dir: PathBuf,

    // Guild defaults
    pub max_queue_size: usize,
    pub idle_minutes: u64,
    pub default_volume: u8,
    pub use_cookies: bool,

    // Sources
    pub ytdlp_path: String,
    pub source_retries: u32,
    pub http_timeout_secs: u64,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("could not create {}", config.data_dir.display()))?;

        Ok(config)
    }

    /// Builds a config from any key lookup. Missing or blank keys take the
    /// default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            max_queue_size: parse_or(get("MAX_QUEUE_SIZE"), "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            idle_minutes: parse_or(get("DEFAULT_IDLE_MINUTES"), "DEFAULT_IDLE_MINUTES", defaults.idle_minutes)?,
            default_volume: parse_or(get("DEFAULT_VOLUME"), "DEFAULT_VOLUME", defaults.default_volume)?,
            use_cookies: match get("USE_COOKIES") {
                Some(value) => parse_bool(&value).with_context(|| format!("USE_COOKIES: invalid value {value:?}"))?,
                None => defaults.use_cookies,
            },
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            source_retries: parse_or(get("SOURCE_RETRIES"), "SOURCE_RETRIES", defaults.source_retries)?,
            http_timeout_secs: parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the per-guild settings could never hold.
    pub fn validate(&self) -> Result<()> {
        let (min_queue, max_queue) = MAX_QUEUE_SIZE_RANGE;
        if !(min_queue..=max_queue).contains(&self.max_queue_size) {
            anyhow::bail!(
                "Max queue size must be between {} and {}, got: {}",
                min_queue,
                max_queue,
                self.max_queue_size
            );
        }

        let (min_idle, max_idle) = IDLE_MINUTES_RANGE;
        if !(min_idle..=max_idle).contains(&self.idle_minutes) {
            anyhow::bail!(
                "Idle minutes must be between {} and {}, got: {}",
                min_idle,
                max_idle,
                self.idle_minutes
            );
        }

        if self.default_volume > 100 {
            anyhow::bail!("Default volume must be between 0 and 100, got: {}", self.default_volume);
        }

        if self.source_retries == 0 {
            anyhow::bail!("Source retries must be at least 1");
        }

        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP timeout must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Settings a guild starts with before anyone changes them.
    pub fn guild_defaults(&self) -> GuildSettings {
        GuildSettings {
            guild_id: 0,
            max_queue_size: self.max_queue_size,
            idle_minutes: self.idle_minutes,
            default_volume: self.default_volume,
            dj_role_id: None,
            use_cookies: self.use_cookies,
        }
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Data: {}\n  \
            Guild defaults: {} queue, {} idle, {}% vol, cookies={}\n  \
            Sources: {} ({} retries, {} timeout)",
            self.data_dir.display(),
            self.max_queue_size,
            humantime::format_duration(Duration::from_secs(self.idle_minutes * 60)),
            self.default_volume,
            self.use_cookies,
            self.ytdlp_path,
            self.source_retries,
            humantime::format_duration(self.http_timeout()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let guild = GuildSettings::default();
        Self {
            data_dir: "./data".into(),

            max_queue_size: guild.max_queue_size,
            idle_minutes: guild.idle_minutes,
            default_volume: guild.default_volume,
            use_cookies: guild.use_cookies,

            ytdlp_path: "yt-dlp".to_string(),
            source_retries: 3,
            http_timeout_secs: 30,
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key}: invalid value {value:?}")),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
