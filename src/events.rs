//! Structured playback events.
//!
//! The player reports what it does through an [`EventSink`] and never waits
//! on it. [`TracingSink`] is the default and turns every event into a
//! `tracing` record with the guild id attached.

use serenity::model::id::{ChannelId, GuildId};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Connected { channel_id: ChannelId },
    QueueAdd { title: String, url: String, position: usize },
    PlaybackStart { title: String, url: String, duration: Option<u64> },
    PlaybackFailure { title: String, reason: String },
    Skip { count: usize, discarded: usize },
    Pause,
    Resume,
    Stop,
    VolumeSet { volume: u8 },
    Seek { offset_secs: u64 },
    AutoLeave,
}

impl PlayerEvent {
    /// Stable machine-readable event name.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Connected { .. } => "voice_connected",
            PlayerEvent::QueueAdd { .. } => "queue_add",
            PlayerEvent::PlaybackStart { .. } => "playback_start",
            PlayerEvent::PlaybackFailure { .. } => "playback_failure",
            PlayerEvent::Skip { .. } => "skip",
            PlayerEvent::Pause => "pause",
            PlayerEvent::Resume => "resume",
            PlayerEvent::Stop => "stop",
            PlayerEvent::VolumeSet { .. } => "volume_set",
            PlayerEvent::Seek { .. } => "seek",
            PlayerEvent::AutoLeave => "auto_leave",
        }
    }
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::Connected { channel_id } => write!(f, "🔊 Connected to voice channel {channel_id}"),
            PlayerEvent::QueueAdd { title, position, .. } => write!(f, "➕ Queued: {title} (#{position})"),
            PlayerEvent::PlaybackStart { title, .. } => write!(f, "🎵 Now playing: {title}"),
            PlayerEvent::PlaybackFailure { title, reason } => write!(f, "❌ Playback failed for {title}: {reason}"),
            PlayerEvent::Skip { count, discarded } => write!(f, "⏭️ Skipped (count={count}, dropped {discarded} queued)"),
            PlayerEvent::Pause => f.write_str("⏸️ Paused"),
            PlayerEvent::Resume => f.write_str("▶️ Resumed"),
            PlayerEvent::Stop => f.write_str("⏹️ Stopped and cleared the queue"),
            PlayerEvent::VolumeSet { volume } => write!(f, "🔊 Volume set to {volume}%"),
            PlayerEvent::Seek { offset_secs } => write!(f, "⏩ Seek to {}:{:02}", offset_secs / 60, offset_secs % 60),
            PlayerEvent::AutoLeave => f.write_str("👋 Left the voice channel after being idle"),
        }
    }
}

/// Fire-and-forget consumer of player events.
pub trait EventSink: Send + Sync {
    fn emit(&self, guild_id: GuildId, event: &PlayerEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, guild_id: GuildId, event: &PlayerEvent) {
        match event {
            PlayerEvent::PlaybackFailure { .. } => {
                warn!(guild_id = %guild_id, event = event.name(), "{}", event)
            }
            _ => info!(guild_id = %guild_id, event = event.name(), "{}", event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_and_messages() {
        let event = PlayerEvent::Seek { offset_secs: 90 };
        assert_eq!(event.name(), "seek");
        assert_eq!(event.to_string(), "⏩ Seek to 1:30");

        let event = PlayerEvent::QueueAdd {
            title: "Song".into(),
            url: "https://example.com".into(),
            position: 3,
        };
        assert_eq!(event.name(), "queue_add");
        assert!(event.to_string().contains("#3"));
        assert_eq!(PlayerEvent::AutoLeave.name(), "auto_leave");
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.emit(GuildId::new(1), &PlayerEvent::Pause);
    }
}
