//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::Notify;

use crate::{
    audio::{Collaborators, GuildPlayer, PlayerRegistry, Track},
    error::{PlayerError, PlayerResult},
    events::{EventSink, PlayerEvent},
    sources::{AudioSource, CredentialStore, ResolveRequest, ResolvedStream, Resolver, SourceFactory, SourceParams, SourceRequest},
    storage::{GuildSettings, SettingsStore},
    voice::{CompletionHandle, PlaybackOutcome, VoiceConnector, VoiceSession},
};

pub fn channel(id: u64) -> ChannelId {
    ChannelId::new(id)
}

pub fn track(name: &str) -> Track {
    Track::new(name, format!("https://example.com/{name}"), UserId::new(1))
}

/// Last path segment of every played stream, i.e. the track names.
pub fn names(plays: &[SourceParams]) -> Vec<String> {
    plays
        .iter()
        .map(|p| p.stream_url.rsplit('/').next().unwrap_or_default().to_string())
        .collect()
}

/// Lets spawned player tasks run to their next real wait.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct VoiceLog {
    pub connects: usize,
    pub disconnects: usize,
    pub connected: bool,
    pub plays: Vec<SourceParams>,
    pub stops: usize,
    pub pauses: usize,
    pub resumes: usize,
    pub live_volume: Option<u8>,
    pub pending: Option<CompletionHandle>,
}

/// Voice transport that records calls. Stopping fires the stopped track's
/// completion, as songbird does.
#[derive(Clone, Default)]
pub struct FakeVoice {
    pub log: Arc<Mutex<VoiceLog>>,
}

impl FakeVoice {
    pub fn plays(&self) -> Vec<SourceParams> {
        self.log.lock().plays.clone()
    }

    pub fn finish_current(&self) -> bool {
        self.complete(PlaybackOutcome::Finished)
    }

    pub fn fail_current(&self, reason: &str) -> bool {
        self.complete(PlaybackOutcome::Failed(reason.to_string()))
    }

    fn complete(&self, outcome: PlaybackOutcome) -> bool {
        let pending = self.log.lock().pending.take();
        match pending {
            Some(handle) => {
                handle.complete(outcome);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VoiceConnector for FakeVoice {
    async fn connect(&self, _guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Box<dyn VoiceSession>> {
        let mut log = self.log.lock();
        log.connects += 1;
        log.connected = true;
        Ok(Box::new(FakeSession {
            channel_id,
            log: self.log.clone(),
        }))
    }
}

struct FakeSession {
    channel_id: ChannelId,
    log: Arc<Mutex<VoiceLog>>,
}

#[async_trait]
impl VoiceSession for FakeSession {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn play(&mut self, source: AudioSource, on_complete: CompletionHandle) -> PlayerResult<()> {
        let ((), params) = source.into_frames::<()>()?;
        let mut log = self.log.lock();
        log.plays.push(params);
        log.pending = Some(on_complete);
        Ok(())
    }

    fn pause(&mut self) {
        self.log.lock().pauses += 1;
    }

    fn resume(&mut self) {
        self.log.lock().resumes += 1;
    }

    fn stop(&mut self) {
        let pending = {
            let mut log = self.log.lock();
            log.stops += 1;
            log.pending.take()
        };
        if let Some(handle) = pending {
            handle.complete(PlaybackOutcome::Finished);
        }
    }

    fn set_volume(&mut self, volume: u8) -> bool {
        self.log.lock().live_volume = Some(volume);
        true
    }

    fn is_playing(&self) -> bool {
        self.log.lock().pending.is_some()
    }

    fn is_paused(&self) -> bool {
        false
    }

    async fn is_connected(&self) -> bool {
        self.log.lock().connected
    }

    async fn disconnect(&mut self) {
        let mut log = self.log.lock();
        log.connected = false;
        log.disconnects += 1;
    }
}

#[derive(Default)]
pub struct MediaLog {
    pub resolved: Vec<ResolveRequest>,
    pub broken_sources: HashSet<String>,
    pub held: HashMap<String, Arc<Notify>>,
}

/// Resolver and source factory in one. The stream url is the query itself
/// and the frames are `()`.
#[derive(Clone, Default)]
pub struct FakeMedia {
    pub log: Arc<Mutex<MediaLog>>,
}

impl FakeMedia {
    pub fn fail_sources_for(&self, name: &str) {
        self.log.lock().broken_sources.insert(track(name).url().to_string());
    }

    /// Makes resolving `name` wait until the returned gate is notified.
    pub fn hold(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.log.lock().held.insert(track(name).url().to_string(), gate.clone());
        gate
    }

    pub fn resolve_count(&self) -> usize {
        self.log.lock().resolved.len()
    }
}

#[async_trait]
impl Resolver for FakeMedia {
    async fn resolve(&self, request: ResolveRequest) -> PlayerResult<ResolvedStream> {
        let gate = self.log.lock().held.remove(&request.query);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let stream = ResolvedStream {
            stream_url: request.query.clone(),
            title: request.query.clone(),
            duration: None,
            provider: "youtube".to_string(),
        };
        self.log.lock().resolved.push(request);
        Ok(stream)
    }
}

#[async_trait]
impl SourceFactory for FakeMedia {
    async fn create(&self, request: SourceRequest) -> PlayerResult<AudioSource> {
        let log = self.log.lock();
        if log.broken_sources.contains(&request.stream_url) {
            return Err(PlayerError::SourceConstructionFailure("stream answered 403".into()));
        }
        Ok(AudioSource::new(&request, ()))
    }
}

#[derive(Default)]
pub struct MemorySettings {
    settings: Mutex<GuildSettings>,
}

impl MemorySettings {
    pub fn update(&self, f: impl FnOnce(&mut GuildSettings)) {
        f(&mut self.settings.lock());
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn guild_settings(&self, guild_id: GuildId) -> anyhow::Result<GuildSettings> {
        Ok(GuildSettings {
            guild_id: guild_id.get(),
            ..self.settings.lock().clone()
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PlayerEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, _guild_id: GuildId, event: &PlayerEvent) {
        self.events.lock().push(event.clone());
    }
}

pub struct Harness {
    pub registry: PlayerRegistry,
    pub voice: FakeVoice,
    pub media: FakeMedia,
    pub settings: Arc<MemorySettings>,
    pub events: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        let media = FakeMedia::default();
        Self::build(Arc::new(media.clone()), media, None)
    }

    pub fn with_resolver(resolver: Arc<dyn Resolver>) -> Self {
        Self::build(resolver, FakeMedia::default(), None)
    }

    pub fn with_credentials(store: Arc<dyn CredentialStore>) -> Self {
        let media = FakeMedia::default();
        Self::build(Arc::new(media.clone()), media, Some(store))
    }

    fn build(resolver: Arc<dyn Resolver>, media: FakeMedia, credentials: Option<Arc<dyn CredentialStore>>) -> Self {
        let voice = FakeVoice::default();
        let settings = Arc::new(MemorySettings::default());
        let events = Arc::new(RecordingSink::default());

        let mut deps = Collaborators::new(resolver, Arc::new(media.clone()), Arc::new(voice.clone()), settings.clone())
            .with_events(events.clone());
        if let Some(store) = credentials {
            deps = deps.with_credentials(store);
        }

        Self {
            registry: PlayerRegistry::new(deps),
            voice,
            media,
            settings,
            events,
        }
    }

    pub fn player(&self) -> Arc<GuildPlayer> {
        self.registry.get_or_create(GuildId::new(1))
    }
}
