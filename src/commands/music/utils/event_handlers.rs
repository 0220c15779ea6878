use std::sync::Arc;

use dashmap::DashMap;
use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::tracks::{PlayMode, TrackHandle};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Opaque identifier for one bound player. Never reused within a process.
pub type PlayerId = u64;

/// Track handles of bound players, tagged with the guild they play in.
pub type PlayerHandles = Arc<DashMap<PlayerId, (GuildId, TrackHandle)>>;

/// What happened to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The track ran to completion or was stopped.
    Finished,
    /// The player failed mid-stream.
    Errored(String),
}

/// A player lifecycle event tagged with the guild and player it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSignal {
    pub guild_id: GuildId,
    pub player_id: PlayerId,
    pub event: PlayerEvent,
}

/// Handed to a voice session when a player is bound; the only way player
/// events get back to the playback engine.
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    guild_id: GuildId,
    player_id: PlayerId,
    tx: UnboundedSender<PlayerSignal>,
}

impl PlayerEventSink {
    pub fn new(guild_id: GuildId, player_id: PlayerId, tx: UnboundedSender<PlayerSignal>) -> Self {
        Self {
            guild_id,
            player_id,
            tx,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Reports `event` for this player. A closed engine drops it silently.
    pub fn emit(&self, event: PlayerEvent) {
        let signal = PlayerSignal {
            guild_id: self.guild_id,
            player_id: self.player_id,
            event,
        };

        if self.tx.send(signal).is_err() {
            debug!(
                "Playback engine gone, dropping event for player {}",
                self.player_id
            );
        }
    }
}

/// Event handler for when a track ends or errors
pub struct TrackEndNotifier {
    pub sink: PlayerEventSink,
    pub players: PlayerHandles,
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(tracks) = ctx {
            // End and Error are both registered; only the first one through reports.
            if self.players.remove(&self.sink.player_id()).is_none() {
                return None;
            }

            let errored = tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(e.to_string()),
                    _ => None,
                });

            match errored {
                Some(reason) => {
                    warn!(
                        "Player {} in guild {} errored: {}",
                        self.sink.player_id(),
                        self.sink.guild_id(),
                        reason
                    );
                    self.sink.emit(PlayerEvent::Errored(reason));
                }
                None => {
                    debug!(
                        "Player {} in guild {} finished",
                        self.sink.player_id(),
                        self.sink.guild_id()
                    );
                    self.sink.emit(PlayerEvent::Finished);
                }
            }
        }
        None
    }
}
