use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::debug;

use super::player::{Collaborators, GuildPlayer};

/// One [`GuildPlayer`] per guild, created on first use and kept for the
/// lifetime of the registry.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    deps: Arc<Collaborators>,
}

impl PlayerRegistry {
    pub fn new(deps: Collaborators) -> Self {
        Self {
            players: DashMap::new(),
            deps: Arc::new(deps),
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🎛️ Creating player for guild {}", guild_id);
                Arc::new(GuildPlayer::new(guild_id, self.deps.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|player| player.value().clone())
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.players.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn test_get_or_create_returns_the_same_player() {
        let h = Harness::new();
        let registry = &h.registry;
        assert!(registry.is_empty());
        assert!(registry.get(GuildId::new(5)).is_none());

        let first = registry.get_or_create(GuildId::new(5));
        let again = registry.get_or_create(GuildId::new(5));
        let other = registry.get_or_create(GuildId::new(6));

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
        assert_eq!(first.guild_id(), GuildId::new(5));
        assert!(registry.get(GuildId::new(6)).is_some());

        let mut ids = registry.guild_ids();
        ids.sort();
        assert_eq!(ids, vec![GuildId::new(5), GuildId::new(6)]);
    }

    #[tokio::test]
    async fn test_players_are_independent() {
        let h = Harness::new();
        let a = h.registry.get_or_create(GuildId::new(1));
        let b = h.registry.get_or_create(GuildId::new(2));

        a.enqueue(crate::testing::track("x")).await.unwrap();
        assert_eq!(a.queue_len().await, 1);
        assert_eq!(b.queue_len().await, 0);
    }
}
