use futures::future::{BoxFuture, FutureExt};
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use super::{
    idle::IdleTimer,
    queue::{QueuePage, TrackQueue},
    track::{LoopMode, PlayerState, Track},
};
use crate::{
    error::{PlayerError, PlayerResult},
    events::{EventSink, PlayerEvent, TracingSink},
    sources::{
        provider_for, AudioSource, CredentialStore, ResolveRequest, ResolvedStream, Resolver, SourceFactory,
        SourceRequest,
    },
    storage::{GuildSettings, SettingsStore},
    voice::{CompletionHandle, PlaybackOutcome, VoiceConnector, VoiceSession},
};

/// Everything a player calls out to.
pub struct Collaborators {
    pub resolver: Arc<dyn Resolver>,
    pub sources: Arc<dyn SourceFactory>,
    pub voice: Arc<dyn VoiceConnector>,
    pub settings: Arc<dyn SettingsStore>,
    pub credentials: Option<Arc<dyn CredentialStore>>,
    pub events: Arc<dyn EventSink>,
}

impl Collaborators {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        sources: Arc<dyn SourceFactory>,
        voice: Arc<dyn VoiceConnector>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            resolver,
            sources,
            voice,
            settings,
            credentials: None,
            events: Arc::new(TracingSink),
        }
    }

    pub fn with_credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }
}

/// State guarded by the player's lock.
struct Inner {
    queue: TrackQueue,
    current: Option<Track>,
    loop_mode: LoopMode,
    /// `None` means "use the guild's default volume".
    volume: Option<u8>,
    session: Option<Box<dyn VoiceSession>>,
    state: PlayerState,
    /// Bumped on every playback decision; completions and resolutions
    /// carrying an older value are ignored.
    attempt: u64,
    idle: IdleTimer,
}

impl Inner {
    /// Picks the next track according to the loop mode.
    fn next_track(&mut self) -> Option<Track> {
        match self.loop_mode {
            LoopMode::Off => self.queue.pop_front(),
            LoopMode::One => match &self.current {
                Some(current) => Some(current.clone()),
                None => self.queue.pop_front(),
            },
            LoopMode::All => {
                let next = self.queue.pop_front()?;
                if let Some(previous) = self.current.take() {
                    self.queue.requeue(previous);
                }
                Some(next)
            }
        }
    }

    fn supersede(&mut self) -> u64 {
        self.attempt += 1;
        self.attempt
    }

    fn drop_session(&mut self) {
        self.session = None;
        self.state = PlayerState::Disconnected;
        self.current = None;
        self.idle.cancel();
        self.supersede();
    }
}

/// Playback state of one guild.
///
/// Every operation takes the player's lock for its whole decision, so two
/// concurrent callers can never both see "nothing playing" and both start a
/// track. Voice connection, stream resolution and source construction run
/// with the lock released; the attempt counter makes sure their results are
/// dropped if something newer happened in the meantime.
pub struct GuildPlayer {
    guild_id: GuildId,
    deps: Arc<Collaborators>,
    inner: Mutex<Inner>,
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId, deps: Arc<Collaborators>) -> Self {
        Self {
            guild_id,
            deps,
            inner: Mutex::new(Inner {
                queue: TrackQueue::new(GuildSettings::default().max_queue_size),
                current: None,
                loop_mode: LoopMode::Off,
                volume: None,
                session: None,
                state: PlayerState::Disconnected,
                attempt: 0,
                idle: IdleTimer::new(),
            }),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Joins `channel`, or checks that the existing session is already there.
    ///
    /// `channel` is the requester's current voice channel; `None` means they
    /// are not in one.
    pub async fn ensure_voice(self: &Arc<Self>, channel: Option<ChannelId>) -> PlayerResult<()> {
        let channel_id =
            channel.ok_or_else(|| PlayerError::PermissionDenied("join a voice channel first".to_string()))?;

        {
            let mut inner = self.inner.lock().await;
            let existing = match inner.session.as_ref() {
                Some(session) => Some((session.is_connected().await, session.channel_id())),
                None => None,
            };

            match existing {
                Some((true, current)) if current == channel_id => return Ok(()),
                Some((true, _)) => return Err(already_elsewhere()),
                Some((false, _)) => {
                    debug!(guild_id = %self.guild_id, "Dropping stale voice session");
                    inner.drop_session();
                }
                None => {}
            }
        }

        let session = self.deps.voice.connect(self.guild_id, channel_id).await?;

        {
            let mut inner = self.inner.lock().await;
            if let Some(existing) = inner.session.as_ref() {
                // Another caller connected while we were joining.
                return if existing.channel_id() == channel_id {
                    Ok(())
                } else {
                    Err(already_elsewhere())
                };
            }
            inner.session = Some(session);
            inner.state = PlayerState::Idle;
        }

        self.emit(PlayerEvent::Connected { channel_id });
        self.spawn_advance();
        Ok(())
    }

    /// Appends a track and returns its 1-based queue position. Starts
    /// playback when the player is idle.
    pub async fn enqueue(self: &Arc<Self>, track: Track) -> PlayerResult<usize> {
        let settings = self.settings().await;
        let title = track.title().to_string();
        let url = track.url().to_string();

        let (position, idle) = {
            let mut inner = self.inner.lock().await;
            inner.queue.set_capacity(settings.max_queue_size);
            let position = inner.queue.enqueue(track)?;
            (position, inner.state == PlayerState::Idle)
        };

        self.emit(PlayerEvent::QueueAdd { title, url, position });
        if idle {
            self.spawn_advance();
        }
        Ok(position)
    }

    /// Stops the current track and drops `count - 1` more from the front of
    /// the queue. `0` and `1` both stop just the current track. Returns how
    /// many queued tracks were dropped.
    pub async fn skip(self: &Arc<Self>, count: usize) -> PlayerResult<usize> {
        let settings = self.settings().await;

        let (discarded, next) = {
            let mut inner = self.inner.lock().await;
            if inner.session.is_none() {
                return Err(PlayerError::VoiceNotConnected);
            }

            let discarded = inner.queue.discard_front(count.max(1) - 1);
            // Also covers a track that just ended and is about to be replayed.
            if inner.loop_mode == LoopMode::One {
                inner.current = None;
            }

            let mut next = None;
            if inner.state.is_active() {
                inner.supersede();
                if let Some(session) = inner.session.as_mut() {
                    session.stop();
                }
                inner.state = PlayerState::Idle;
                next = self.select_next_locked(&mut inner, &settings).await;
            }
            (discarded, next)
        };

        self.emit(PlayerEvent::Skip { count, discarded });
        if let Some((track, attempt)) = next {
            self.spawn_attempt(track, attempt, None, settings);
        }
        Ok(discarded)
    }

    /// Returns `false` when nothing was playing.
    pub async fn pause(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Playing {
            return false;
        }
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        session.pause();
        inner.state = PlayerState::Paused;
        drop(inner);

        self.emit(PlayerEvent::Pause);
        true
    }

    /// Returns `false` when nothing was paused.
    pub async fn resume(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Paused {
            return false;
        }
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        session.resume();
        inner.state = PlayerState::Playing;
        drop(inner);

        self.emit(PlayerEvent::Resume);
        true
    }

    /// Clears the queue and stops playback. The session stays open and the
    /// idle timer starts counting.
    pub async fn stop(self: &Arc<Self>) -> PlayerResult<()> {
        let settings = self.settings().await;
        {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let Some(session) = inner.session.as_mut() else {
                return Err(PlayerError::VoiceNotConnected);
            };
            session.stop();

            inner.queue.clear();
            inner.current = None;
            inner.supersede();
            inner.state = PlayerState::Idle;
            self.arm_idle(inner, settings.idle_delay());
        }

        self.emit(PlayerEvent::Stop);
        Ok(())
    }

    /// Restarts the current track at `offset_secs` without touching the queue.
    pub async fn seek(self: &Arc<Self>, offset_secs: u64) -> PlayerResult<()> {
        let settings = self.settings().await;
        let (track, attempt) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            let track = inner.current.clone().ok_or(PlayerError::VoiceNotConnected)?;
            let session = inner.session.as_mut().ok_or(PlayerError::VoiceNotConnected)?;
            session.stop();

            inner.idle.cancel();
            inner.state = PlayerState::Resolving;
            (track, inner.supersede())
        };

        self.emit(PlayerEvent::Seek { offset_secs });
        self.spawn_attempt(track, attempt, Some(offset_secs), settings);
        Ok(())
    }

    /// Clamps to 0..=100 and returns the value applied. The new volume is
    /// used from the next track on, and right away if the transport can
    /// adjust it live.
    pub async fn set_volume(&self, volume: i32) -> u8 {
        let volume = volume.clamp(0, 100) as u8;
        let live = {
            let mut inner = self.inner.lock().await;
            inner.volume = Some(volume);
            inner.state.is_active() && inner.session.as_mut().is_some_and(|s| s.set_volume(volume))
        };

        debug!(guild_id = %self.guild_id, live, "Volume set to {}", volume);
        self.emit(PlayerEvent::VolumeSet { volume });
        volume
    }

    /// Explicit volume, or `None` when the guild default applies.
    pub async fn volume(&self) -> Option<u8> {
        self.inner.lock().await.volume
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) {
        self.inner.lock().await.loop_mode = mode;
        info!(guild_id = %self.guild_id, "🔁 Loop mode: {}", mode);
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.inner.lock().await.loop_mode
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn now_playing(&self) -> Option<Track> {
        self.inner.lock().await.current.clone()
    }

    pub async fn queue_snapshot(&self) -> Vec<Track> {
        self.inner.lock().await.queue.tracks()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn queue_page(&self, page: usize, per_page: usize) -> QueuePage {
        self.inner.lock().await.queue.page(page, per_page)
    }

    pub async fn remove(&self, index: usize) -> PlayerResult<Track> {
        self.inner.lock().await.queue.remove(index)
    }

    pub async fn move_track(&self, from: usize, to: usize) -> PlayerResult<()> {
        self.inner.lock().await.queue.move_track(from, to)
    }

    pub async fn shuffle(&self) {
        self.inner.lock().await.queue.shuffle();
        info!(guild_id = %self.guild_id, "🔀 Queue shuffled");
    }

    /// Empties the queue without touching the current track.
    pub async fn clear_queue(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let cleared = inner.queue.len();
        inner.queue.clear();
        cleared
    }

    // Internals

    fn emit(&self, event: PlayerEvent) {
        self.deps.events.emit(self.guild_id, &event);
    }

    async fn settings(&self) -> GuildSettings {
        match self.deps.settings.guild_settings(self.guild_id).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(guild_id = %self.guild_id, "Could not read guild settings, using defaults: {:?}", e);
                GuildSettings {
                    guild_id: self.guild_id.get(),
                    ..GuildSettings::default()
                }
            }
        }
    }

    fn spawn_advance(self: &Arc<Self>) {
        let player = Arc::clone(self);
        tokio::spawn(async move {
            player.advance().await;
        });
    }

    /// Runs an attempt already decided under the lock, off the caller's task.
    fn spawn_attempt(self: &Arc<Self>, track: Track, attempt: u64, seek: Option<u64>, settings: GuildSettings) {
        let player = Arc::clone(self);
        tokio::spawn(async move {
            player.run_attempt(track, attempt, seek, &settings).await;
        });
    }

    /// Starts the next track if the session is idle, skipping tracks that
    /// fail to start, or arms the idle timer when there is nothing left.
    async fn advance(self: &Arc<Self>) {
        loop {
            let settings = self.settings().await;
            let next = {
                let mut inner = self.inner.lock().await;
                self.select_next_locked(&mut inner, &settings).await
            };

            let Some((track, attempt)) = next else {
                return;
            };
            if self.start_playback(track, attempt, None, &settings).await {
                return;
            }
        }
    }

    /// Decision half of advancing; the caller holds the lock. On a pick the
    /// player moves to `Resolving` and the returned attempt id identifies it.
    async fn select_next_locked(self: &Arc<Self>, inner: &mut Inner, settings: &GuildSettings) -> Option<(Track, u64)> {
        if inner.state != PlayerState::Idle {
            return None;
        }

        let connected = match inner.session.as_ref() {
            Some(session) => session.is_connected().await,
            None => false,
        };
        if !connected {
            if inner.session.is_some() {
                warn!(guild_id = %self.guild_id, "Voice session lost");
            }
            inner.drop_session();
            return None;
        }

        match inner.next_track() {
            Some(track) => {
                inner.idle.cancel();
                let attempt = inner.supersede();
                inner.current = Some(track.clone());
                inner.state = PlayerState::Resolving;
                Some((track, attempt))
            }
            None => {
                inner.current = None;
                self.arm_idle(inner, settings.idle_delay());
                None
            }
        }
    }

    fn arm_idle(self: &Arc<Self>, inner: &mut Inner, delay: Duration) {
        let player = Arc::downgrade(self);
        let armed = inner.idle.arm(delay, async move {
            if let Some(player) = player.upgrade() {
                player.on_idle_expired().await;
            }
        });
        if armed {
            debug!(
                guild_id = %self.guild_id,
                "📭 Queue empty, leaving in {}",
                humantime::format_duration(delay)
            );
        }
    }

    async fn on_idle_expired(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.idle.disarm();
            if inner.state != PlayerState::Idle {
                return;
            }
            if let Some(mut session) = inner.session.take() {
                session.disconnect().await;
            }
            inner.state = PlayerState::Disconnected;
            inner.current = None;
            inner.supersede();
        }

        self.emit(PlayerEvent::AutoLeave);
    }

    async fn run_attempt(self: &Arc<Self>, track: Track, attempt: u64, seek: Option<u64>, settings: &GuildSettings) {
        if !self.start_playback(track, attempt, seek, settings).await {
            self.advance().await;
        }
    }

    /// Resolves and plays `track` for `attempt`. Returns `false` only when
    /// the attempt failed and the caller should move on to the next track.
    async fn start_playback(
        self: &Arc<Self>,
        track: Track,
        attempt: u64,
        seek: Option<u64>,
        settings: &GuildSettings,
    ) -> bool {
        let volume = self
            .inner
            .lock()
            .await
            .volume
            .unwrap_or(settings.default_volume)
            .min(100);

        let prepared = self.prepare_source(&track, volume, seek, settings).await;

        let mut inner = self.inner.lock().await;
        if inner.attempt != attempt || inner.state != PlayerState::Resolving {
            debug!(guild_id = %self.guild_id, "Attempt {} was superseded", attempt);
            return true;
        }

        let started = match prepared {
            Ok((source, stream)) => {
                let (handle, rx) = CompletionHandle::channel();
                let played = match inner.session.as_mut() {
                    Some(session) => session.play(source, handle).await,
                    None => Err(PlayerError::VoiceNotConnected),
                };
                played.map(|()| (rx, stream))
            }
            Err(e) => Err(e),
        };

        match started {
            Ok((rx, stream)) => {
                inner.state = PlayerState::Playing;
                inner.idle.cancel();
                inner.current = inner.current.take().map(|current| with_stream_details(current, &stream));
                drop(inner);

                self.watch_completion(attempt, rx);
                self.emit(PlayerEvent::PlaybackStart {
                    title: stream.title,
                    url: track.url().to_string(),
                    duration: stream.duration.or(track.duration()),
                });
                true
            }
            Err(e) => {
                inner.current = None;
                inner.state = if inner.session.is_some() {
                    PlayerState::Idle
                } else {
                    PlayerState::Disconnected
                };
                drop(inner);

                error!(guild_id = %self.guild_id, "❌ Could not play {}: {}", track.title(), e);
                self.emit(PlayerEvent::PlaybackFailure {
                    title: track.title().to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    async fn prepare_source(
        &self,
        track: &Track,
        volume: u8,
        seek: Option<u64>,
        settings: &GuildSettings,
    ) -> PlayerResult<(AudioSource, ResolvedStream)> {
        let credentials = match (&self.deps.credentials, settings.use_cookies) {
            (Some(store), true) => store.credentials_for(self.guild_id, provider_for(track.url())).await,
            _ => None,
        };

        let stream = self
            .deps
            .resolver
            .resolve(ResolveRequest {
                query: track.url().to_string(),
                guild_id: self.guild_id,
                credentials,
            })
            .await?;

        let source = self
            .deps
            .sources
            .create(SourceRequest {
                stream_url: stream.stream_url.clone(),
                volume,
                seek: seek.map(Duration::from_secs),
            })
            .await?;

        Ok((source, stream))
    }

    fn watch_completion(self: &Arc<Self>, attempt: u64, rx: oneshot::Receiver<PlaybackOutcome>) {
        let player = Arc::downgrade(self);
        tokio::spawn(async move {
            let outcome = rx.await.unwrap_or(PlaybackOutcome::Abandoned);
            if let Some(player) = player.upgrade() {
                player.on_playback_finished(attempt, outcome).await;
            }
        });
    }

    // Boxed: this re-enters `advance`, which spawned the task calling it.
    fn on_playback_finished(self: Arc<Self>, attempt: u64, outcome: PlaybackOutcome) -> BoxFuture<'static, ()> {
        async move {
            let failed = {
                let mut inner = self.inner.lock().await;
                if inner.attempt != attempt {
                    debug!(guild_id = %self.guild_id, "Ignoring completion of superseded attempt {}", attempt);
                    return;
                }
                if matches!(inner.state, PlayerState::Playing | PlayerState::Paused) {
                    inner.state = PlayerState::Idle;
                }

                match outcome {
                    PlaybackOutcome::Failed(reason) => {
                        // A track that broke mid-stream is not replayed by loop modes.
                        let title = inner.current.take().map(|t| t.title().to_string()).unwrap_or_default();
                        Some((title, reason))
                    }
                    PlaybackOutcome::Finished | PlaybackOutcome::Abandoned => None,
                }
            };

            if let Some((title, reason)) = failed {
                self.emit(PlayerEvent::PlaybackFailure { title, reason });
            }
            self.advance().await;
        }
        .boxed()
    }
}

/// Fills in what only the resolver knows: the provider, and the duration
/// when the caller did not supply one.
fn with_stream_details(track: Track, stream: &ResolvedStream) -> Track {
    let track = track.with_provider(stream.provider.clone());
    match (track.duration(), stream.duration) {
        (None, Some(seconds)) => track.with_duration(seconds),
        _ => track,
    }
}

fn already_elsewhere() -> PlayerError {
    PlayerError::PermissionDenied("already connected to another voice channel in this guild".to_string())
}
