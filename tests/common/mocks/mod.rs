//! Mock implementations for the engine's collaborators

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mockall::mock;
use poise::serenity_prelude::{ChannelId, GuildId};
use rubi::commands::music::utils::event_handlers::{PlayerEvent, PlayerEventSink, PlayerId};
use rubi::commands::music::utils::notifier::{PlaybackEvent, PlaybackObserver};
use rubi::{MusicError, MusicResult, Resolution, Track, TrackResolver, VoiceSession};

use super::fixtures;

mock! {
    pub Resolver {}

    #[async_trait]
    impl TrackResolver for Resolver {
        async fn resolve(&self, query: &str) -> MusicResult<Resolution>;
        async fn stream_url(&self, track: &Track) -> MusicResult<String>;
    }
}

/// Resolver mock backed by the fixture catalog
pub fn catalog_resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|query| fixtures::resolve(query));
    resolver
        .expect_stream_url()
        .returning(|track| fixtures::stream_url(track));
    resolver
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    Connect(GuildId, ChannelId),
    Play(GuildId, String),
    Stop(PlayerId),
    Destroy(GuildId),
}

/// In-memory voice session that records every call. Stopping a player
/// reports `Finished`, like a real player does. A session can exist without
/// being connected, which is what a kick or a half-done join leaves behind.
#[derive(Default)]
pub struct FakeVoice {
    sessions: Mutex<HashSet<GuildId>>,
    channels: Mutex<HashMap<GuildId, ChannelId>>,
    players: Mutex<HashMap<PlayerId, PlayerEventSink>>,
    calls: Mutex<Vec<VoiceCall>>,
    fail_connect: AtomicBool,
    keep_failed_session: AtomicBool,
}

impl FakeVoice {
    /// Every join fails and leaves nothing behind
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Every join fails but leaves an unconnected session in place
    pub fn fail_connect_keeping_session(&self) {
        self.fail_connect();
        self.keep_failed_session.store(true, Ordering::SeqCst);
    }

    pub fn allow_connect(&self) {
        self.fail_connect.store(false, Ordering::SeqCst);
        self.keep_failed_session.store(false, Ordering::SeqCst);
    }

    /// The bot gets kicked: the connection goes, the session stays
    pub fn drop_connection(&self, guild_id: GuildId) {
        self.channels.lock().unwrap().remove(&guild_id);
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.lock().unwrap().get(&guild_id).copied()
    }

    pub fn has_session(&self, guild_id: GuildId) -> bool {
        self.sessions.lock().unwrap().contains(&guild_id)
    }

    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Stream URLs bound in `guild_id`, in order
    pub fn played(&self, guild_id: GuildId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VoiceCall::Play(g, url) if g == guild_id => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.count(|call| matches!(call, VoiceCall::Connect(..)))
    }

    pub fn destroys(&self) -> usize {
        self.count(|call| matches!(call, VoiceCall::Destroy(_)))
    }

    pub fn stops(&self) -> Vec<PlayerId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VoiceCall::Stop(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&VoiceCall) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    /// The most recently bound player of `guild_id` that has not ended yet
    pub fn current_player(&self, guild_id: GuildId) -> Option<PlayerId> {
        self.players
            .lock()
            .unwrap()
            .values()
            .filter(|sink| sink.guild_id() == guild_id)
            .map(|sink| sink.player_id())
            .max()
    }

    /// Ends the current player of `guild_id` as if the track ran out
    pub fn finish_current(&self, guild_id: GuildId) {
        self.end_current(guild_id, PlayerEvent::Finished);
    }

    /// Fails the current player of `guild_id` mid-stream
    pub fn error_current(&self, guild_id: GuildId, reason: &str) {
        self.end_current(guild_id, PlayerEvent::Errored(reason.to_string()));
    }

    fn end_current(&self, guild_id: GuildId, event: PlayerEvent) {
        let player_id = self
            .current_player(guild_id)
            .expect("no player bound in guild");
        let sink = self.players.lock().unwrap().remove(&player_id).unwrap();
        sink.emit(event);
    }

    fn record(&self, call: VoiceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VoiceSession for FakeVoice {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> MusicResult<()> {
        self.record(VoiceCall::Connect(guild_id, channel_id));
        tokio::task::yield_now().await;

        if self.fail_connect.load(Ordering::SeqCst) {
            if self.keep_failed_session.load(Ordering::SeqCst) {
                self.sessions.lock().unwrap().insert(guild_id);
            }
            return Err(MusicError::Connection("Missing permissions".to_string()));
        }
        self.sessions.lock().unwrap().insert(guild_id);
        self.channels.lock().unwrap().insert(guild_id, channel_id);
        Ok(())
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channel(guild_id)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        stream_url: &str,
        sink: PlayerEventSink,
    ) -> MusicResult<()> {
        tokio::task::yield_now().await;

        if self.channel(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }
        self.record(VoiceCall::Play(guild_id, stream_url.to_string()));
        self.players.lock().unwrap().insert(sink.player_id(), sink);
        Ok(())
    }

    async fn stop(&self, player_id: PlayerId) -> MusicResult<()> {
        self.record(VoiceCall::Stop(player_id));
        let sink = self.players.lock().unwrap().remove(&player_id);
        if let Some(sink) = sink {
            sink.emit(PlayerEvent::Finished);
        }
        Ok(())
    }

    async fn destroy(&self, guild_id: GuildId) -> MusicResult<()> {
        self.record(VoiceCall::Destroy(guild_id));
        self.channels.lock().unwrap().remove(&guild_id);
        if self.sessions.lock().unwrap().remove(&guild_id) {
            Ok(())
        } else {
            Err(MusicError::NotConnected)
        }
    }
}

/// Observer that keeps every event it sees
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(GuildId, PlaybackEvent)>>,
}

impl RecordingObserver {
    pub fn events(&self, guild_id: GuildId) -> Vec<PlaybackEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == guild_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self, guild_id: GuildId, pred: impl Fn(&PlaybackEvent) -> bool) -> usize {
        self.events(guild_id).iter().filter(|e| pred(e)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl PlaybackObserver for RecordingObserver {
    fn on_event(&self, guild_id: GuildId, event: &PlaybackEvent) {
        self.events.lock().unwrap().push((guild_id, event.clone()));
    }
}
