use std::sync::Arc;

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use super::embedded_messages;
use crate::commands::music::audio_sources::track_metadata::Track;

/// Presence shown while nothing is playing.
pub const IDLE_PRESENCE: &str = "Ready to play music!";

/// Why a guild's voice session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Someone ran `/stop`.
    Stopped,
    /// The idle-leave timer fired with the queue still empty.
    IdleTimeout,
    /// The session was torn down from outside (kicked, channel deleted).
    SessionLost,
}

/// Transitions of the playback engine that the outside world may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    NowPlaying(Track),
    Enqueued { track: Track, position: usize },
    PlaylistEnqueued { title: String, added: usize },
    TrackFailed { track: Track, reason: String },
    QueueFinished,
    Disconnected(DisconnectReason),
}

/// Side-effecting listener for engine transitions.
///
/// Called while the guild's state is locked, so implementations must not
/// block; anything slow should be spawned.
pub trait PlaybackObserver: Send + Sync {
    fn on_event(&self, guild_id: serenity::GuildId, event: &PlaybackEvent);
}

/// Posts playback notifications to each guild's notification channel and
/// keeps the bot presence in sync with what is playing.
#[derive(Clone)]
pub struct DiscordNotifier {
    ctx: serenity::Context,
    hints: Arc<Vec<String>>,
    channels: Arc<DashMap<serenity::GuildId, serenity::ChannelId>>,
}

impl DiscordNotifier {
    pub fn new(ctx: serenity::Context, hints: Vec<String>) -> Self {
        Self {
            ctx,
            hints: Arc::new(hints),
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Sets the "Playing ..." activity of the bot.
    pub fn set_presence(&self, text: &str) {
        self.ctx
            .set_activity(Some(serenity::ActivityData::playing(text)));
    }

    /// The channel notifications for `guild_id` go to, cached after the first lookup.
    pub fn notification_channel(&self, guild_id: serenity::GuildId) -> Option<serenity::ChannelId> {
        if let Some(channel) = self.channels.get(&guild_id) {
            return Some(*channel);
        }

        let channel = find_notification_channel(&self.ctx.cache, guild_id, &self.hints)?;
        self.channels.insert(guild_id, channel);
        Some(channel)
    }

    /// Sends `embed` to the guild's notification channel in the background.
    /// A failed send drops the cached channel so the next post looks it up again.
    pub fn post(&self, guild_id: serenity::GuildId, embed: serenity::CreateEmbed) {
        let Some(channel_id) = self.notification_channel(guild_id) else {
            debug!("No notification channel in guild {}", guild_id);
            return;
        };

        let ctx = self.ctx.clone();
        let channels = Arc::clone(&self.channels);
        tokio::spawn(async move {
            let message = serenity::CreateMessage::new().embed(embed);
            if let Err(e) = channel_id.send_message(&ctx, message).await {
                warn!(
                    "Failed to send notification to channel {} in guild {}: {}",
                    channel_id, guild_id, e
                );
                channels.remove(&guild_id);
            }
        });
    }
}

impl PlaybackObserver for DiscordNotifier {
    fn on_event(&self, guild_id: serenity::GuildId, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::NowPlaying(track) => {
                self.set_presence(&track.to_string());
                self.post(guild_id, embedded_messages::now_playing(track));
            }
            PlaybackEvent::QueueFinished => {
                self.set_presence(IDLE_PRESENCE);
                self.post(guild_id, embedded_messages::queue_finished());
            }
            PlaybackEvent::Disconnected(reason) => {
                info!("Left voice in guild {} ({:?})", guild_id, reason);
                self.set_presence(IDLE_PRESENCE);
            }
            PlaybackEvent::TrackFailed { track, reason } => {
                debug!("Skipped '{}' in guild {}: {}", track.title(), guild_id, reason);
            }
            PlaybackEvent::Enqueued { .. } | PlaybackEvent::PlaylistEnqueued { .. } => {}
        }
    }
}

/// A guild channel as far as notification routing cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCandidate {
    pub id: serenity::ChannelId,
    pub name: String,
    pub position: u16,
    pub is_text: bool,
}

/// Looks the guild up in the cache and picks its notification channel.
pub fn find_notification_channel(
    cache: &serenity::Cache,
    guild_id: serenity::GuildId,
    hints: &[String],
) -> Option<serenity::ChannelId> {
    let candidates: Vec<ChannelCandidate> = {
        let guild = cache.guild(guild_id)?;
        guild
            .channels
            .values()
            .map(|channel| ChannelCandidate {
                id: channel.id,
                name: channel.name.clone(),
                position: channel.position,
                is_text: channel.kind == serenity::ChannelType::Text,
            })
            .collect()
    };

    pick_notification_channel(candidates, hints)
}

/// First text channel (by position) whose name contains one of `hints`,
/// falling back to the first text channel.
pub fn pick_notification_channel(
    mut candidates: Vec<ChannelCandidate>,
    hints: &[String],
) -> Option<serenity::ChannelId> {
    candidates.retain(|c| c.is_text);
    candidates.sort_by_key(|c| (c.position, c.id.get()));

    candidates
        .iter()
        .find(|c| {
            let name = c.name.to_lowercase();
            hints.iter().any(|hint| name.contains(hint.as_str()))
        })
        .or_else(|| candidates.first())
        .map(|c| c.id)
}
