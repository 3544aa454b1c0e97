//! # Audio Module
//!
//! Per-guild playback orchestration.
//!
//! ### [`track`] - Track Model
//! - [`Track`], [`LoopMode`] and [`PlayerState`]
//!
//! ### [`queue`] - Queue Management
//! - Bounded FIFO with 1-based editing, shuffle and paging
//!
//! ### [`player`] - Guild Player
//! - The playback state machine: voice session, current track, loop mode,
//!   volume and auto-leave, all behind one lock per guild
//!
//! ### [`registry`] - Player Registry
//! - Lazily created players keyed by guild
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_jukebox::audio::{PlayerRegistry, Track};
//! use serenity::all::{ChannelId, GuildId, UserId};
//!
//! # async fn example(registry: PlayerRegistry) -> anyhow::Result<()> {
//! let player = registry.get_or_create(GuildId::new(123456789));
//!
//! player.ensure_voice(Some(ChannelId::new(42))).await?;
//! player
//!     .enqueue(Track::new("Song", "https://youtu.be/x", UserId::new(7)))
//!     .await?;
//!
//! player.pause().await;
//! player.resume().await;
//! player.skip(1).await?;
//! # Ok(())
//! # }
//! ```

pub mod idle;
pub mod player;
pub mod queue;
pub mod registry;
pub mod track;

pub use idle::IdleTimer;
pub use player::{Collaborators, GuildPlayer};
pub use queue::{QueuePage, TrackQueue};
pub use registry::PlayerRegistry;
pub use track::{LoopMode, PlayerState, Track};
