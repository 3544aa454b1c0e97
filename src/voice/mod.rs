//! Voice transport seam.
//!
//! A [`VoiceConnector`] opens a [`VoiceSession`] bound to one channel. The
//! session plays one [`AudioSource`] at a time and reports the end of
//! playback exactly once through the [`CompletionHandle`] it was given.

pub mod discord;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::oneshot;

use crate::error::PlayerResult;
use crate::sources::AudioSource;

pub use discord::{SongbirdConnector, SongbirdSession};

/// How a playback attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The track ran to its end or was stopped.
    Finished,
    /// The transport hit an error mid-stream.
    Failed(String),
    /// The session went away without reporting.
    Abandoned,
}

/// One-shot notification that a playback attempt is over. Consumed on use,
/// so it cannot fire twice.
#[derive(Debug)]
pub struct CompletionHandle {
    tx: oneshot::Sender<PlaybackOutcome>,
}

impl CompletionHandle {
    pub fn channel() -> (Self, oneshot::Receiver<PlaybackOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, outcome: PlaybackOutcome) {
        // The player may have stopped listening; that is fine.
        let _ = self.tx.send(outcome);
    }
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Joins `channel_id`. Fails with `PermissionDenied` when the channel
    /// cannot be joined.
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Box<dyn VoiceSession>>;
}

#[async_trait]
pub trait VoiceSession: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    async fn play(&mut self, source: AudioSource, on_complete: CompletionHandle) -> PlayerResult<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stops the current track. The transport may still fire the completion
    /// handle of the stopped track.
    fn stop(&mut self);

    /// Adjusts the volume of the playing track. Returns `false` when the
    /// transport cannot change volume live.
    fn set_volume(&mut self, _volume: u8) -> bool {
        false
    }

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&mut self);
}
