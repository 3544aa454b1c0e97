use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, RoleId};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

pub const MAX_QUEUE_SIZE_RANGE: (usize, usize) = (50, 1000);
pub const IDLE_MINUTES_RANGE: (u64, u64) = (1, 60);

/// Per-guild playback settings, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub max_queue_size: usize,
    pub idle_minutes: u64,
    pub default_volume: u8,
    pub dj_role_id: Option<u64>,
    pub use_cookies: bool,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            guild_id: 0,
            max_queue_size: 300,
            idle_minutes: 10,
            default_volume: 70,
            dj_role_id: None,
            use_cookies: true,
        }
    }
}

impl GuildSettings {
    pub fn idle_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_minutes.saturating_mul(60))
    }

    pub fn dj_role(&self) -> Option<RoleId> {
        self.dj_role_id.filter(|id| *id != 0).map(RoleId::new)
    }

    fn clamped(mut self) -> Self {
        self.max_queue_size = self
            .max_queue_size
            .clamp(MAX_QUEUE_SIZE_RANGE.0, MAX_QUEUE_SIZE_RANGE.1);
        self.idle_minutes = self.idle_minutes.clamp(IDLE_MINUTES_RANGE.0, IDLE_MINUTES_RANGE.1);
        self.default_volume = self.default_volume.min(100);
        self
    }
}

/// Read access to per-guild settings. Consulted by the player at every
/// decision point.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings>;
}

/// Settings store backed by one `guild_<id>.json` file per guild.
pub struct JsonStorage {
    data_dir: PathBuf,
    defaults: GuildSettings,
    servers_cache: RwLock<HashMap<u64, GuildSettings>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf, defaults: GuildSettings) -> Result<Self> {
        let servers_dir = data_dir.join("servers");
        fs::create_dir_all(&servers_dir)
            .await
            .with_context(|| format!("could not create {}", servers_dir.display()))?;

        info!("📁 Storage initialized at: {}", data_dir.display());

        let storage = Self {
            data_dir,
            defaults,
            servers_cache: RwLock::new(HashMap::new()),
        };
        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Returns a guild's settings, falling back to the defaults when the
    /// guild has never been configured.
    pub async fn get_server_config(&self, guild_id: u64) -> Result<GuildSettings> {
        if let Some(config) = self.servers_cache.read().get(&guild_id) {
            return Ok(config.clone());
        }

        let config = match self.load_server_config(guild_id).await {
            Ok(config) => config,
            Err(_) => GuildSettings {
                guild_id,
                ..self.defaults.clone()
            },
        };
        self.servers_cache.write().insert(guild_id, config.clone());
        Ok(config)
    }

    pub async fn update_server_config(&self, config: GuildSettings) -> Result<()> {
        let config = config.clamped();
        let guild_id = config.guild_id;

        self.save_server_config(&config).await?;
        self.servers_cache.write().insert(guild_id, config);

        info!("💾 Settings updated for guild {}", guild_id);
        Ok(())
    }

    pub async fn set_max_queue_size(&self, guild_id: u64, size: usize) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.max_queue_size = size;
        self.update_server_config(config).await
    }

    pub async fn set_idle_minutes(&self, guild_id: u64, minutes: u64) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.idle_minutes = minutes;
        self.update_server_config(config).await
    }

    pub async fn set_default_volume(&self, guild_id: u64, volume: u8) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.default_volume = volume;
        self.update_server_config(config).await
    }

    pub async fn set_dj_role(&self, guild_id: u64, role_id: Option<u64>) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.dj_role_id = role_id;
        self.update_server_config(config).await
    }

    pub async fn set_use_cookies(&self, guild_id: u64, enabled: bool) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.use_cookies = enabled;
        self.update_server_config(config).await
    }

    pub fn list_servers(&self) -> Vec<u64> {
        self.servers_cache.read().keys().copied().collect()
    }

    async fn load_server_config(&self, guild_id: u64) -> Result<GuildSettings> {
        let file_path = self.get_server_file_path(guild_id);
        let content = fs::read_to_string(&file_path).await?;
        let config: GuildSettings = serde_json::from_str(&content)
            .with_context(|| format!("invalid settings file {}", file_path.display()))?;
        Ok(GuildSettings { guild_id, ..config })
    }

    async fn save_server_config(&self, config: &GuildSettings) -> Result<()> {
        let file_path = self.get_server_file_path(config.guild_id);
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&file_path, content)
            .await
            .with_context(|| format!("could not write {}", file_path.display()))?;
        Ok(())
    }

    async fn load_all_servers(&self) -> Result<()> {
        let servers_dir = self.data_dir.join("servers");
        let mut files = fs::read_dir(&servers_dir).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            match self.load_server_config(guild_id).await {
                Ok(config) => {
                    self.servers_cache.write().insert(guild_id, config);
                    loaded_count += 1;
                }
                Err(e) => warn!("Could not load settings for guild {}: {}", guild_id, e),
            }
        }

        if loaded_count > 0 {
            info!("📂 Loaded {} guild settings files", loaded_count);
        }

        Ok(())
    }

    fn get_server_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir.join("servers").join(format!("guild_{}.json", guild_id))
    }
}

#[async_trait]
impl SettingsStore for JsonStorage {
    async fn guild_settings(&self, guild_id: GuildId) -> Result<GuildSettings> {
        self.get_server_config(guild_id.get()).await
    }
}
