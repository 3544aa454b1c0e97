use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{fmt, str::FromStr, time::Duration};

/// One queued item. Immutable once built; the queue or the player's
/// `current` slot owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    url: String,
    duration: Option<u64>,
    requested_by: UserId,
    provider: String,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration: None,
            requested_by,
            provider: "source".to_string(),
            added_at: Utc::now(),
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    /// Duration in whole seconds, when the resolver reported one.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn provider(&self) -> &str {
        &self.provider
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    // Builders
    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    pub fn duration_as_std(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(secs) => write!(f, "{} ({}:{:02})", self.title, secs / 60, secs % 60),
            None => f.write_str(&self.title),
        }
    }
}

/// What happens to `current` and the queue when the player advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    /// Repeat the current track.
    One,
    /// Cycle through the whole queue.
    All,
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(LoopMode::Off),
            "one" | "track" => Ok(LoopMode::One),
            "all" | "queue" => Ok(LoopMode::All),
            other => Err(format!("unknown loop mode '{other}' (expected off, one or all)")),
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopMode::Off => "off",
            LoopMode::One => "one",
            LoopMode::All => "all",
        })
    }
}

/// Lifecycle of a guild's playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No voice session.
    #[default]
    Disconnected,
    /// Session open, nothing playing or paused.
    Idle,
    /// A track was picked and is being resolved into a playable source.
    Resolving,
    Playing,
    Paused,
}

impl PlayerState {
    /// Whether a track occupies the session (in flight, playing or paused).
    pub fn is_active(self) -> bool {
        matches!(self, PlayerState::Resolving | PlayerState::Playing | PlayerState::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_mode_parsing() {
        assert_eq!("off".parse::<LoopMode>().unwrap(), LoopMode::Off);
        assert_eq!("ONE".parse::<LoopMode>().unwrap(), LoopMode::One);
        assert_eq!("track".parse::<LoopMode>().unwrap(), LoopMode::One);
        assert_eq!(" all ".parse::<LoopMode>().unwrap(), LoopMode::All);
        assert_eq!("queue".parse::<LoopMode>().unwrap(), LoopMode::All);
        assert!("forever".parse::<LoopMode>().is_err());
        assert_eq!(LoopMode::All.to_string(), "all");
    }

    #[test]
    fn test_track_display() {
        let user = UserId::new(7);
        let track = Track::new("Song", "https://example.com/a", user).with_duration(200);
        assert_eq!(track.to_string(), "Song (3:20)");
        assert_eq!(Track::new("Live", "x", user).to_string(), "Live");
        assert_eq!(track.provider(), "source");
        assert_eq!(track.duration_as_std(), Some(Duration::from_secs(200)));
    }

    #[test]
    fn test_active_states() {
        assert!(!PlayerState::Disconnected.is_active());
        assert!(!PlayerState::Idle.is_active());
        assert!(PlayerState::Resolving.is_active());
        assert!(PlayerState::Playing.is_active());
        assert!(PlayerState::Paused.is_active());
    }
}
