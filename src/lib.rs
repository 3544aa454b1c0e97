//! # guild-jukebox
//!
//! Playback core for Discord music bots: one player per guild owning a
//! bounded track queue, a voice session, loop mode, volume and an idle
//! auto-leave timer.
//!
//! The command layer (slash commands, embeds, buttons) lives outside this
//! crate. It builds a [`app::Jukebox`] (or its own
//! [`audio::Collaborators`]), checks [`permissions::is_allowed`], and calls
//! into [`audio::GuildPlayer`].
//!
//! ```rust,no_run
//! use guild_jukebox::{app::Jukebox, config::Config, logging};
//! use songbird::Songbird;
//!
//! # async fn example() -> anyhow::Result<()> {
//! logging::init()?;
//! let jukebox = Jukebox::with_songbird(Config::load()?, Songbird::serenity()).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod permissions;
pub mod sources;
pub mod storage;
pub mod voice;

#[cfg(test)]
mod testing;

pub use audio::{GuildPlayer, LoopMode, PlayerRegistry, PlayerState, Track};
pub use error::{PlayerError, PlayerResult};
