use serenity::async_trait;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::input::HttpRequest;
use songbird::{Event, Songbird, TrackEvent};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use dashmap::DashMap;

use super::event_handlers::{PlayerEventSink, PlayerHandles, PlayerId, TrackEndNotifier};

/// Errors that can occur during music operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("Not in a guild")]
    NotInGuild,

    #[error("You need to be in a voice channel")]
    UserNotInVoiceChannel,

    #[error("I'm not connected to a voice channel")]
    NotConnected,

    #[error("There's no song currently playing")]
    NothingPlaying,

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("Could not resolve track: {0}")]
    Resolution(String),

    #[error("Failed to join voice channel: {0}")]
    Connection(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MusicError {
    /// Errors caused by the caller's situation rather than by a collaborator.
    /// These are reported back as a rejection, never logged as failures.
    pub fn is_user_state(&self) -> bool {
        matches!(
            self,
            MusicError::NotInGuild
                | MusicError::UserNotInVoiceChannel
                | MusicError::NotConnected
                | MusicError::NothingPlaying
        )
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// The chat platform's voice connection and audio player, as seen by the playback engine.
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Joins (or moves to) `channel_id` in `guild_id`. A failed join leaves
    /// no session behind.
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<()>;

    /// The channel the guild's session is actually connected to. `None` when
    /// there is no session, or it exists but lost its connection.
    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;

    /// Binds a new player for `stream_url`. Lifecycle events for the player are
    /// reported through `sink`, exactly once per end or error.
    async fn play(&self, guild_id: GuildId, stream_url: &str, sink: PlayerEventSink)
    -> MusicResult<()>;

    /// Stops a player. Stopping emits the same completion event as a natural end.
    async fn stop(&self, player_id: PlayerId) -> MusicResult<()>;

    /// Leaves the voice channel and drops the session, connected or not.
    async fn destroy(&self, guild_id: GuildId) -> MusicResult<()>;
}

/// Manages Songbird voice connections and the track handles bound to them
pub struct MusicManager {
    songbird: Arc<Songbird>,
    http_client: reqwest::Client,
    players: PlayerHandles,
}

impl MusicManager {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            http_client: reqwest::Client::new(),
            players: Arc::new(DashMap::new()),
        }
    }

    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    fn forget_players(&self, guild_id: GuildId) {
        drop_guild_players(&self.players, guild_id);
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }
}

/// Drops every entry bound in `guild_id`, returning how many went.
fn drop_guild_players<T>(players: &DashMap<PlayerId, (GuildId, T)>, guild_id: GuildId) -> usize {
    let before = players.len();
    players.retain(|_, (guild, _)| *guild != guild_id);
    before - players.len()
}

#[async_trait]
impl VoiceSession for MusicManager {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<()> {
        info!("Joining voice channel {} in guild {}", channel_id, guild_id);

        match self.songbird.join(guild_id, channel_id).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // join registers the call before connecting; don't leave it dangling
                if self.current_channel(guild_id).await.is_none() {
                    if let Err(remove_err) = self.songbird.remove(guild_id).await {
                        warn!(
                            "Failed to drop call in guild {} after failed join: {}",
                            guild_id, remove_err
                        );
                    }
                    self.forget_players(guild_id);
                }
                Err(MusicError::Connection(e.to_string()))
            }
        }
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.songbird.get(guild_id)?;
        let handler = call.lock().await;
        handler
            .current_channel()
            .map(|channel| ChannelId::new(channel.0.get()))
    }

    async fn play(
        &self,
        guild_id: GuildId,
        stream_url: &str,
        sink: PlayerEventSink,
    ) -> MusicResult<()> {
        let call = self
            .songbird
            .get(guild_id)
            .ok_or(MusicError::NotConnected)?;

        let input = HttpRequest::new(self.http_client.clone(), stream_url.to_string());
        let track_handle = {
            let mut handler = call.lock().await;
            handler.play_input(input.into())
        };

        let player_id = sink.player_id();
        self.players
            .insert(player_id, (guild_id, track_handle.clone()));

        for event in [TrackEvent::End, TrackEvent::Error] {
            let registered = track_handle.add_event(
                Event::Track(event),
                TrackEndNotifier {
                    sink: sink.clone(),
                    players: Arc::clone(&self.players),
                },
            );
            if let Err(e) = registered {
                self.players.remove(&player_id);
                return Err(MusicError::Playback(e.to_string()));
            }
        }

        debug!("Bound player {} in guild {}", player_id, guild_id);
        Ok(())
    }

    async fn stop(&self, player_id: PlayerId) -> MusicResult<()> {
        match self.players.get(&player_id) {
            Some(entry) => entry
                .1
                .stop()
                .map_err(|e| MusicError::Playback(e.to_string())),
            None => {
                debug!("Player {} already released", player_id);
                Ok(())
            }
        }
    }

    async fn destroy(&self, guild_id: GuildId) -> MusicResult<()> {
        if self.songbird.get(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }

        // The driver goes away with the call, so End may never fire for these
        self.forget_players(guild_id);
        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| MusicError::Connection(e.to_string()))
    }
}
