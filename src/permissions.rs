//! Who may do what.
//!
//! Pure policy for the command layer: it gathers the requester's roles and
//! permissions from Discord, then asks [`is_allowed`] before calling into
//! the player.

use serenity::model::id::RoleId;

use crate::storage::GuildSettings;

/// Volumes above this need a DJ.
pub const DJ_VOLUME_THRESHOLD: i32 = 80;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub roles: Vec<RoleId>,
    /// Holds the Manage Guild permission.
    pub manage_guild: bool,
}

impl Requester {
    pub fn new(roles: impl IntoIterator<Item = RoleId>, manage_guild: bool) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            manage_guild,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Skip { count: usize },
    Stop,
    Volume(i32),
    /// Changing the guild's stored settings.
    ManageSettings,
}

/// Manage Guild, or the guild's configured DJ role.
pub fn is_dj(requester: &Requester, settings: &GuildSettings) -> bool {
    requester.manage_guild
        || settings
            .dj_role()
            .is_some_and(|role| requester.roles.contains(&role))
}

pub fn is_allowed(requester: &Requester, settings: &GuildSettings, action: GuardedAction) -> bool {
    match action {
        GuardedAction::Skip { count } if count > 1 => is_dj(requester, settings),
        GuardedAction::Stop => is_dj(requester, settings),
        GuardedAction::Volume(volume) if volume > DJ_VOLUME_THRESHOLD => is_dj(requester, settings),
        GuardedAction::ManageSettings => requester.manage_guild,
        GuardedAction::Skip { .. } | GuardedAction::Volume(_) => true,
    }
}
