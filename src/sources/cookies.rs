use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CredentialHandle, CredentialStore};

/// Cookies files on disk.
///
/// A guild's own `<root>/<guild_id>/<provider>.txt` wins over the shared
/// `<root>/<provider>.txt`.
pub struct CookieDirectory {
    root: PathBuf,
}

impl CookieDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CredentialStore for CookieDirectory {
    async fn credentials_for(&self, guild_id: GuildId, provider: &str) -> Option<CredentialHandle> {
        let file = format!("{provider}.txt");
        let candidates = [self.root.join(guild_id.to_string()).join(&file), self.root.join(&file)];

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!("🍪 Using {} cookies from {}", provider, path.display());
                return Some(CredentialHandle {
                    provider: provider.to_string(),
                    path,
                });
            }
        }
        None
    }
}
