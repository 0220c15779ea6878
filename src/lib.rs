//! Rubi, a Discord music bot.
//!
//! Each guild gets its own playback queue driven by
//! [`PlaybackEngine`]; tracks are resolved through `yt-dlp` and streamed
//! into voice with songbird.

use std::sync::Arc;

pub mod commands;
pub mod config;
pub mod events;

pub use commands::music::audio_sources::track_metadata::Track;
pub use commands::music::audio_sources::{Resolution, TrackResolver};
pub use commands::music::utils::music_manager::{MusicError, MusicResult, VoiceSession};
pub use commands::music::utils::playback_engine::{PlayOutcome, PlaybackEngine, QueueSnapshot};
pub use config::BotConfig;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub engine: Arc<PlaybackEngine>,
}
