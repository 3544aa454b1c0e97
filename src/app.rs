use anyhow::{Context, Result};
use songbird::Songbird;
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::{Collaborators, PlayerRegistry},
    config::Config,
    sources::{CookieDirectory, HttpSourceFactory, YtDlpResolver},
    storage::JsonStorage,
    voice::{SongbirdConnector, VoiceConnector},
};

/// The production wiring: players backed by yt-dlp, HTTP sources, JSON
/// settings and cookies under the data directory.
pub struct Jukebox {
    pub config: Config,
    pub players: PlayerRegistry,
    pub storage: Arc<JsonStorage>,
}

impl Jukebox {
    pub async fn new(config: Config, voice: Arc<dyn VoiceConnector>) -> Result<Self> {
        info!("🎵 Starting guild-jukebox v{}", env!("CARGO_PKG_VERSION"));
        info!("{}", config.summary());

        let storage = Arc::new(JsonStorage::new(config.data_dir.clone(), config.guild_defaults()).await?);

        let sources = HttpSourceFactory::new(config.http_timeout(), config.source_retries)
            .context("could not build the HTTP source factory")?;
        let cookies = CookieDirectory::new(config.data_dir.join("cookies"));

        let deps = Collaborators::new(
            Arc::new(YtDlpResolver::new(config.ytdlp_path.clone())),
            Arc::new(sources),
            voice,
            storage.clone(),
        )
        .with_credentials(Arc::new(cookies));

        Ok(Self {
            config,
            players: PlayerRegistry::new(deps),
            storage,
        })
    }

    /// Uses the songbird manager registered on the serenity client.
    pub async fn with_songbird(config: Config, manager: Arc<Songbird>) -> Result<Self> {
        Self::new(config, Arc::new(SongbirdConnector::new(manager))).await
    }
}
