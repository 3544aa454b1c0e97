use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::Input, tracks::TrackHandle, Call, Event, EventContext, EventHandler as VoiceEventHandler,
    Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{CompletionHandle, PlaybackOutcome, VoiceConnector, VoiceSession};
use crate::error::{PlayerError, PlayerResult};
use crate::sources::AudioSource;

/// Opens voice sessions through songbird.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Box<dyn VoiceSession>> {
        info!("🔗 Joining channel {} in guild {}", channel_id, guild_id);

        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Could not join voice channel: {:?}", e);
            PlayerError::PermissionDenied(format!("could not join voice channel {channel_id}"))
        })?;

        Ok(Box::new(SongbirdSession {
            manager: self.manager.clone(),
            guild_id,
            channel_id,
            call,
            track: None,
            flags: Arc::new(PlaybackFlags::default()),
        }))
    }
}

#[derive(Debug, Default)]
struct PlaybackFlags {
    playing: AtomicBool,
    paused: AtomicBool,
}

impl PlaybackFlags {
    fn set(&self, playing: bool, paused: bool) {
        self.playing.store(playing, Ordering::SeqCst);
        self.paused.store(paused, Ordering::SeqCst);
    }
}

/// A songbird call plus the handle of the track it is playing.
pub struct SongbirdSession {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
    track: Option<TrackHandle>,
    flags: Arc<PlaybackFlags>,
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(&mut self, source: AudioSource, on_complete: CompletionHandle) -> PlayerResult<()> {
        let (input, params) = source.into_frames::<Input>()?;

        if let Some(previous) = self.track.take() {
            let _ = previous.stop();
        }

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        let _ = handle.set_volume(f32::from(params.volume) / 100.0);
        if let Some(offset) = params.seek {
            let _ = handle.seek(offset);
        }

        // One set of flags per track.
        self.flags = Arc::new(PlaybackFlags::default());
        let completion = Arc::new(SyncMutex::new(Some(on_complete)));
        for (event, failed) in [(TrackEvent::End, false), (TrackEvent::Error, true)] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        guild_id: self.guild_id,
                        completion: completion.clone(),
                        flags: self.flags.clone(),
                        failed,
                    },
                )
                .map_err(|e| PlayerError::VoiceTransport(format!("could not watch track: {e:?}")))?;
        }

        self.flags.set(true, false);
        self.track = Some(handle);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(track) = &self.track {
            let _ = track.pause();
            self.flags.set(false, true);
        }
    }

    fn resume(&mut self) {
        if let Some(track) = &self.track {
            let _ = track.play();
            self.flags.set(true, false);
        }
    }

    fn stop(&mut self) {
        if let Some(track) = self.track.take() {
            let _ = track.stop();
        }
        self.flags.set(false, false);
    }

    fn set_volume(&mut self, volume: u8) -> bool {
        match &self.track {
            Some(track) => track.set_volume(f32::from(volume) / 100.0).is_ok(),
            None => false,
        }
    }

    fn is_playing(&self) -> bool {
        self.flags.playing.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn disconnect(&mut self) {
        self.stop();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error leaving voice in guild {}: {:?}", self.guild_id, e);
        }
        info!("👋 Disconnected from voice in guild {}", self.guild_id);
    }
}

/// Forwards the end (or failure) of a track to the player, once.
struct TrackEndNotifier {
    guild_id: GuildId,
    completion: Arc<SyncMutex<Option<CompletionHandle>>>,
    flags: Arc<PlaybackFlags>,
    failed: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let Some(handle) = self.completion.lock().take() else {
            return None;
        };

        debug!("🎵 Track ended in guild {} (failed: {})", self.guild_id, self.failed);
        self.flags.set(false, false);

        let outcome = if self.failed {
            PlaybackOutcome::Failed("the voice transport reported a track error".to_string())
        } else {
            PlaybackOutcome::Finished
        };
        handle.complete(outcome);

        None
    }
}
