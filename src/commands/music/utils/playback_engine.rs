//! Per-guild playback state machine.
//!
//! Every operation that reads and then writes a guild's [`GuildPlaybackState`]
//! does so while holding that guild's lock, so two commands for the same guild
//! can never interleave between "is something playing?" and "start a player".
//! Guilds never wait on each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::event_handlers::{PlayerEvent, PlayerEventSink, PlayerId, PlayerSignal};
use super::idle_timer::IDLE_LEAVE_DELAY;
use super::music_manager::{MusicError, MusicResult, VoiceSession};
use super::notifier::{DisconnectReason, PlaybackEvent, PlaybackObserver};
use super::queue_manager::{ActivePlayer, GuildPlaybackState, PlaybackPhase};
use crate::commands::music::audio_sources::track_metadata::Track;
use crate::commands::music::audio_sources::{Resolution, TrackResolver};

/// How many upcoming tracks `/queue` lists.
pub const QUEUE_VIEW_LIMIT: usize = 10;

type GuildSlot = Arc<Mutex<GuildPlaybackState>>;
type GuildGuard = OwnedMutexGuard<GuildPlaybackState>;

/// What a `/play` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Nothing was active; the track started right away.
    Started(Track),
    /// Something was already active; the track was appended.
    Queued { track: Track, position: usize },
    /// A playlist was appended. `started` is true if it kicked off playback.
    PlaylistQueued {
        title: String,
        url: Option<String>,
        added: usize,
        started: bool,
    },
}

/// Read-only view of a guild's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub now_playing: Option<Track>,
    /// At most [`QUEUE_VIEW_LIMIT`] pending tracks, in play order.
    pub upcoming: Vec<Track>,
    /// Total number of pending tracks.
    pub total: usize,
}

enum Advance {
    Started(Track),
    Exhausted { last_error: Option<MusicError> },
}

/// Owns the per-guild state table and drives every transition.
pub struct PlaybackEngine {
    guilds: DashMap<GuildId, GuildSlot>,
    resolver: Arc<dyn TrackResolver>,
    voice: Arc<dyn VoiceSession>,
    observer: Arc<dyn PlaybackObserver>,
    next_player_id: AtomicU64,
    signals: UnboundedSender<PlayerSignal>,
}

impl PlaybackEngine {
    /// Creates the engine and spawns the task that dispatches player signals.
    /// Must be called from within a Tokio runtime.
    pub fn new(
        resolver: Arc<dyn TrackResolver>,
        voice: Arc<dyn VoiceSession>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let engine = Arc::new(Self {
            guilds: DashMap::new(),
            resolver,
            voice,
            observer,
            next_player_id: AtomicU64::new(1),
            signals: tx,
        });

        tokio::spawn(Self::dispatch_signals(Arc::downgrade(&engine), rx));
        engine
    }

    /// Single entry point for player lifecycle signals. Each signal is handled
    /// in its own task; the guild lock orders them.
    async fn dispatch_signals(engine: Weak<Self>, mut rx: UnboundedReceiver<PlayerSignal>) {
        while let Some(signal) = rx.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            tokio::spawn(async move {
                engine.handle_player_event(signal).await;
            });
        }
        debug!("Player signal dispatcher stopped");
    }

    async fn lock_or_create(&self, guild_id: GuildId) -> GuildGuard {
        loop {
            let slot = Arc::clone(self.guilds.entry(guild_id).or_default().value());
            let state = slot.lock_owned().await;
            if !state.is_discarded() {
                return state;
            }
        }
    }

    async fn lock_existing(&self, guild_id: GuildId) -> Option<GuildGuard> {
        loop {
            let slot = self
                .guilds
                .get(&guild_id)
                .map(|entry| Arc::clone(entry.value()))?;
            let state = slot.lock_owned().await;
            if !state.is_discarded() {
                return Some(state);
            }
        }
    }

    /// Drops the guild's state. Must be called with the guild's lock held.
    fn discard(&self, guild_id: GuildId, state: &mut GuildGuard) {
        state.mark_discarded();
        let slot = OwnedMutexGuard::mutex(state);
        self.guilds
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, slot));
        debug!("Discarded playback state for guild {}", guild_id);
    }

    fn notify(&self, guild_id: GuildId, event: PlaybackEvent) {
        self.observer.on_event(guild_id, &event);
    }

    /// Resolves `query`, makes sure the bot is in `channel_id` (joining or
    /// moving there if needed), enqueues the
    /// result and starts playback if nothing was active.
    pub async fn handle_play(
        self: &Arc<Self>,
        guild_id: GuildId,
        channel_id: ChannelId,
        query: &str,
    ) -> MusicResult<PlayOutcome> {
        let resolution = self.resolver.resolve(query).await?;
        if resolution.tracks().is_empty() {
            return Err(MusicError::Resolution(format!(
                "No results found for '{}'",
                query
            )));
        }

        let mut state = self.lock_or_create(guild_id).await;

        if self.voice.current_channel(guild_id).await != Some(channel_id) {
            if let Err(err) = self.voice.connect(guild_id, channel_id).await {
                if state.is_vacant() && state.phase() == PlaybackPhase::Idle {
                    self.discard(guild_id, &mut state);
                }
                return Err(err);
            }
        }

        let was_active = state.is_busy();

        match resolution {
            Resolution::Track(track) => {
                let position = state.enqueue(track.clone());

                if was_active {
                    info!(
                        "Queued '{}' at position {} in guild {}",
                        track.title(),
                        position,
                        guild_id
                    );
                    self.notify(
                        guild_id,
                        PlaybackEvent::Enqueued {
                            track: track.clone(),
                            position,
                        },
                    );
                    return Ok(PlayOutcome::Queued { track, position });
                }

                match self.advance(guild_id, &mut state).await {
                    Advance::Started(track) => Ok(PlayOutcome::Started(track)),
                    Advance::Exhausted { last_error } => Err(last_error.unwrap_or_else(|| {
                        MusicError::Playback(format!("Could not play '{}'", track.title()))
                    })),
                }
            }
            Resolution::Playlist { title, url, tracks } => {
                let added = tracks.len();
                for track in tracks {
                    state.enqueue(track);
                }

                info!(
                    "Queued playlist '{}' ({} tracks) in guild {}",
                    title, added, guild_id
                );
                self.notify(
                    guild_id,
                    PlaybackEvent::PlaylistEnqueued {
                        title: title.clone(),
                        added,
                    },
                );

                let started = !was_active
                    && matches!(
                        self.advance(guild_id, &mut state).await,
                        Advance::Started(_)
                    );

                Ok(PlayOutcome::PlaylistQueued {
                    title,
                    url,
                    added,
                    started,
                })
            }
        }
    }

    /// Pops tracks until one starts. Tracks whose stream cannot be resolved
    /// or bound are reported and skipped. When the queue runs dry the guild
    /// moves to `AwaitingLeave` and the idle-leave timer is armed.
    async fn advance(self: &Arc<Self>, guild_id: GuildId, state: &mut GuildGuard) -> Advance {
        let mut last_error = None;

        while let Some(track) = state.dequeue_next() {
            state.cancel_idle_timer();
            state.set_phase(PlaybackPhase::Loading);

            match self.start_track(guild_id, &track).await {
                Ok(player_id) => {
                    state.set_active_player(Some(ActivePlayer {
                        id: player_id,
                        track: track.clone(),
                    }));
                    state.set_phase(PlaybackPhase::Playing);
                    info!("Now playing '{}' in guild {}", track.title(), guild_id);
                    self.notify(guild_id, PlaybackEvent::NowPlaying(track.clone()));
                    return Advance::Started(track);
                }
                Err(err) => {
                    warn!(
                        "Failed to play '{}' in guild {}: {}",
                        track.title(),
                        guild_id,
                        err
                    );
                    self.notify(
                        guild_id,
                        PlaybackEvent::TrackFailed {
                            track,
                            reason: err.to_string(),
                        },
                    );
                    last_error = Some(err);
                }
            }
        }

        state.set_active_player(None);
        state.set_phase(PlaybackPhase::AwaitingLeave);
        info!("Queue finished in guild {}", guild_id);
        self.notify(guild_id, PlaybackEvent::QueueFinished);

        let engine = Arc::downgrade(self);
        state.arm_idle_timer(IDLE_LEAVE_DELAY, move |generation| async move {
            if let Some(engine) = engine.upgrade() {
                engine.on_idle_timeout(guild_id, generation).await;
            }
        });

        Advance::Exhausted { last_error }
    }

    async fn start_track(&self, guild_id: GuildId, track: &Track) -> MusicResult<PlayerId> {
        let stream_url = self.resolver.stream_url(track).await?;

        let player_id = self.next_player_id.fetch_add(1, Ordering::Relaxed);
        let sink = PlayerEventSink::new(guild_id, player_id, self.signals.clone());
        self.voice.play(guild_id, &stream_url, sink).await?;

        Ok(player_id)
    }

    async fn on_idle_timeout(&self, guild_id: GuildId, generation: u64) {
        let Some(mut state) = self.lock_existing(guild_id).await else {
            return;
        };

        if !state.take_fired_timer(generation) {
            debug!(
                "Idle timer generation {} in guild {} was superseded",
                generation, guild_id
            );
            return;
        }

        if state.phase() != PlaybackPhase::AwaitingLeave
            || !state.is_empty()
            || state.active_player().is_some()
        {
            return;
        }

        info!("Leaving voice in guild {} after being idle", guild_id);
        if let Err(err) = self.voice.destroy(guild_id).await {
            warn!("Failed to leave voice in guild {}: {}", guild_id, err);
        }
        self.discard(guild_id, &mut state);
        self.notify(
            guild_id,
            PlaybackEvent::Disconnected(DisconnectReason::IdleTimeout),
        );
    }

    /// Completion and error both advance the queue. Signals from a player
    /// that is no longer the active one are ignored.
    pub async fn handle_player_event(self: &Arc<Self>, signal: PlayerSignal) {
        let guild_id = signal.guild_id;

        let Some(mut state) = self.lock_existing(guild_id).await else {
            debug!(
                "Ignoring signal for player {} in guild {} without state",
                signal.player_id, guild_id
            );
            return;
        };

        let Some(finished) = state.take_active_player_if(signal.player_id) else {
            debug!(
                "Ignoring stale signal for player {} in guild {}",
                signal.player_id, guild_id
            );
            return;
        };

        match signal.event {
            PlayerEvent::Finished => {
                info!("Finished '{}' in guild {}", finished.track.title(), guild_id);
            }
            PlayerEvent::Errored(reason) => {
                warn!(
                    "Player error on '{}' in guild {}: {}",
                    finished.track.title(),
                    guild_id,
                    reason
                );
                self.notify(
                    guild_id,
                    PlaybackEvent::TrackFailed {
                        track: finished.track,
                        reason,
                    },
                );
            }
        }

        self.advance(guild_id, &mut state).await;
    }

    /// Clears everything and leaves voice. Returns how many pending tracks
    /// were dropped. Fails with `NotConnected`, changing nothing, when the
    /// guild has neither state nor a voice session.
    pub async fn handle_stop(&self, guild_id: GuildId) -> MusicResult<usize> {
        let mut state = self.lock_existing(guild_id).await;
        let connected = self.voice.current_channel(guild_id).await.is_some();

        if state.is_none() && !connected {
            return Err(MusicError::NotConnected);
        }

        let mut cleared = 0;
        if let Some(state) = state.as_mut() {
            state.cancel_idle_timer();
            cleared = state.clear_queue();
            if let Some(player) = state.take_active_player() {
                if let Err(err) = self.voice.stop(player.id).await {
                    warn!("Failed to stop player in guild {}: {}", guild_id, err);
                }
            }
        }

        if connected {
            if let Err(err) = self.voice.destroy(guild_id).await {
                warn!("Failed to leave voice in guild {}: {}", guild_id, err);
            }
        }

        if let Some(mut state) = state {
            self.discard(guild_id, &mut state);
        }

        info!("Stopped playback in guild {}", guild_id);
        self.notify(
            guild_id,
            PlaybackEvent::Disconnected(DisconnectReason::Stopped),
        );
        Ok(cleared)
    }

    /// Stops the current player. The queue moves on through the same
    /// completion signal a natural end produces.
    pub async fn handle_skip(&self, guild_id: GuildId) -> MusicResult<Track> {
        let state = self
            .lock_existing(guild_id)
            .await
            .ok_or(MusicError::NothingPlaying)?;

        let player = state
            .active_player()
            .cloned()
            .ok_or(MusicError::NothingPlaying)?;

        self.voice.stop(player.id).await?;
        info!("Skipped '{}' in guild {}", player.track.title(), guild_id);
        Ok(player.track)
    }

    /// Drops the pending queue, leaving the current track alone.
    pub async fn handle_skip_all(&self, guild_id: GuildId) -> usize {
        match self.lock_existing(guild_id).await {
            Some(mut state) => {
                let cleared = state.clear_queue();
                info!("Cleared {} queued tracks in guild {}", cleared, guild_id);
                cleared
            }
            None => 0,
        }
    }

    pub async fn handle_queue_view(&self, guild_id: GuildId) -> QueueSnapshot {
        match self.lock_existing(guild_id).await {
            Some(state) => QueueSnapshot {
                now_playing: state.active_player().map(|p| p.track.clone()),
                upcoming: state.upcoming(QUEUE_VIEW_LIMIT),
                total: state.len(),
            },
            None => QueueSnapshot::default(),
        }
    }

    /// Joins `channel_id` without queuing anything.
    pub async fn handle_join(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<()> {
        let mut state = self.lock_or_create(guild_id).await;
        let result = self.voice.connect(guild_id, channel_id).await;

        if state.is_vacant() && state.phase() == PlaybackPhase::Idle {
            self.discard(guild_id, &mut state);
        }

        result
    }

    /// The gateway reported the bot out of voice. Only acted on if the voice
    /// session confirms it lost its connection; a late echo of our own leave
    /// must not touch a session started since. The dead session is dropped
    /// even when the guild has no playback state.
    pub async fn handle_voice_disconnected(&self, guild_id: GuildId) {
        let mut state = self.lock_or_create(guild_id).await;

        if let Some(channel_id) = self.voice.current_channel(guild_id).await {
            debug!(
                "Ignoring disconnect in guild {}: still connected to {}",
                guild_id, channel_id
            );
            if state.is_vacant() && state.phase() == PlaybackPhase::Idle {
                self.discard(guild_id, &mut state);
            }
            return;
        }

        let had_playback = !state.is_vacant() || state.phase() != PlaybackPhase::Idle;

        if let Some(player) = state.take_active_player() {
            if let Err(err) = self.voice.stop(player.id).await {
                debug!("Failed to stop player in guild {}: {}", guild_id, err);
            }
        }

        if let Err(err) = self.voice.destroy(guild_id).await {
            debug!("No voice session to drop in guild {}: {}", guild_id, err);
        }

        self.discard(guild_id, &mut state);
        if had_playback {
            info!("Voice session lost in guild {}", guild_id);
            self.notify(
                guild_id,
                PlaybackEvent::Disconnected(DisconnectReason::SessionLost),
            );
        }
    }

    /// Current phase of the guild; `Idle` if it has no state.
    pub async fn phase(&self, guild_id: GuildId) -> PlaybackPhase {
        match self.lock_existing(guild_id).await {
            Some(state) => state.phase(),
            None => PlaybackPhase::Idle,
        }
    }

    pub fn has_guild(&self, guild_id: GuildId) -> bool {
        self.guilds.contains_key(&guild_id)
    }
}
