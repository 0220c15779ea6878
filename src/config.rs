use poise::serenity_prelude::GuildId;

use crate::commands::music::utils::music_manager::{MusicError, MusicResult};

const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
const DEFAULT_RESOLVER_ATTEMPTS: u32 = 2;
const DEFAULT_NOTIFICATION_CHANNEL_HINTS: &str = "bot,general";

/// Runtime settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub discord_token: String,
    /// Register slash commands in this guild only, for development
    pub dev_guild_id: Option<GuildId>,
    pub ytdlp_path: String,
    /// How many times each yt-dlp invocation is tried
    pub resolver_attempts: u32,
    /// Lowercase name fragments that mark a text channel for notifications
    pub notification_channel_hints: Vec<String>,
}

impl BotConfig {
    pub fn from_env() -> MusicResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> MusicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = var("DISCORD_TOKEN")
            .ok_or_else(|| MusicError::Config("DISCORD_TOKEN is not set".to_string()))?;

        let dev_guild_id = match var("DEV_GUILD_ID") {
            Some(raw) => Some(parse_guild_id(&raw)?),
            None => None,
        };

        let ytdlp_path = var("YTDLP_PATH").unwrap_or_else(|| DEFAULT_YTDLP_PATH.to_string());

        let resolver_attempts = match var("RESOLVER_ATTEMPTS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                MusicError::Config(format!("RESOLVER_ATTEMPTS must be a number: {}", e))
            })?,
            None => DEFAULT_RESOLVER_ATTEMPTS,
        };

        let notification_channel_hints = parse_hints(
            &var("NOTIFICATION_CHANNEL_HINTS")
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_CHANNEL_HINTS.to_string()),
        );

        let config = Self {
            discord_token,
            dev_guild_id,
            ytdlp_path,
            resolver_attempts,
            notification_channel_hints,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MusicResult<()> {
        if self.resolver_attempts == 0 {
            return Err(MusicError::Config(
                "RESOLVER_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// One-line description for the startup log. Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "yt-dlp: {} ({} attempts), commands: {}, notification hints: [{}]",
            self.ytdlp_path,
            self.resolver_attempts,
            self.dev_guild_id
                .map(|id| format!("guild {}", id))
                .unwrap_or_else(|| "global".to_string()),
            self.notification_channel_hints.join(", ")
        )
    }
}

fn parse_guild_id(raw: &str) -> MusicResult<GuildId> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id > 0 => Ok(GuildId::new(id)),
        _ => Err(MusicError::Config(format!(
            "DEV_GUILD_ID must be a non-zero guild id, got '{}'",
            raw
        ))),
    }
}

fn parse_hints(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|hint| hint.trim().to_lowercase())
        .filter(|hint| !hint.is_empty())
        .collect()
}
