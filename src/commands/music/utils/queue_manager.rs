use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::event_handlers::PlayerId;
use super::idle_timer::IdleTimer;
use crate::commands::music::audio_sources::track_metadata::Track;

/// Where a guild is in the playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    /// No queue, no timer.
    #[default]
    Idle,
    /// Queue ran dry and the idle-leave timer is armed.
    AwaitingLeave,
    /// A track was popped and its stream is being resolved or bound.
    Loading,
    /// A player is bound and streaming.
    Playing,
}

/// The player currently bound to the guild's voice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePlayer {
    pub id: PlayerId,
    pub track: Track,
}

/// Queue, active player and idle timer for a single guild.
///
/// Only the playback engine touches this, always while holding the guild's lock.
#[derive(Debug, Default)]
pub struct GuildPlaybackState {
    pending: VecDeque<Track>,
    active_player: Option<ActivePlayer>,
    idle_timer: Option<IdleTimer>,
    timer_generation: u64,
    phase: PlaybackPhase,
    discarded: bool,
}

impl GuildPlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track and cancels any armed idle timer.
    /// Returns the 1-based position of the track in the pending queue.
    pub fn enqueue(&mut self, track: Track) -> usize {
        self.cancel_idle_timer();
        self.pending.push_back(track);
        self.pending.len()
    }

    pub fn dequeue_next(&mut self) -> Option<Track> {
        self.pending.pop_front()
    }

    /// Empties the pending queue, returning how many tracks were removed.
    pub fn clear_queue(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The first `limit` pending tracks in play order.
    pub fn upcoming(&self, limit: usize) -> Vec<Track> {
        self.pending.iter().take(limit).cloned().collect()
    }

    /// Cancels any existing timer and schedules `on_fire` after `delay`.
    ///
    /// `on_fire` receives the generation of the new timer so the firing path
    /// can tell whether it is still the armed one.
    pub fn arm_idle_timer<F, Fut>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel_idle_timer();
        self.timer_generation += 1;
        let generation = self.timer_generation;
        self.idle_timer = Some(IdleTimer::spawn(generation, delay, on_fire(generation)));
        debug!("Armed idle timer generation {}", generation);
        generation
    }

    /// No-op if no timer is armed.
    pub fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            debug!("Cancelled idle timer generation {}", timer.generation());
            timer.cancel();
        }
    }

    /// Claims the armed timer on behalf of its own firing task.
    ///
    /// Returns false if that timer was cancelled or replaced in the meantime,
    /// in which case the firing must have no effect.
    pub fn take_fired_timer(&mut self, generation: u64) -> bool {
        match self.idle_timer.take() {
            Some(timer) if timer.generation() == generation => {
                timer.release();
                true
            }
            other => {
                self.idle_timer = other;
                false
            }
        }
    }

    pub fn has_idle_timer(&self) -> bool {
        self.idle_timer.is_some()
    }

    pub fn set_active_player(&mut self, player: Option<ActivePlayer>) {
        self.active_player = player;
    }

    pub fn active_player(&self) -> Option<&ActivePlayer> {
        self.active_player.as_ref()
    }

    pub fn take_active_player(&mut self) -> Option<ActivePlayer> {
        self.active_player.take()
    }

    /// Releases the active player only if it is the one identified by `id`.
    pub fn take_active_player_if(&mut self, id: PlayerId) -> Option<ActivePlayer> {
        match &self.active_player {
            Some(player) if player.id == id => self.active_player.take(),
            _ => None,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: PlaybackPhase) {
        self.phase = phase;
    }

    /// A track is loading or playing.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, PlaybackPhase::Loading | PlaybackPhase::Playing)
    }

    /// Nothing queued, nothing bound, no timer.
    pub fn is_vacant(&self) -> bool {
        self.pending.is_empty() && self.active_player.is_none() && self.idle_timer.is_none()
    }

    /// Marks the state as removed from the guild table. Anyone still waiting
    /// on its lock must look the guild up again.
    pub fn mark_discarded(&mut self) {
        self.cancel_idle_timer();
        self.pending.clear();
        self.active_player = None;
        self.phase = PlaybackPhase::Idle;
        self.discarded = true;
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[fixture]
    fn tracks() -> Vec<Track> {
        (1..=3)
            .map(|i| {
                Track::new(
                    format!("Song {}", i),
                    format!("https://example.com/{}", i),
                    "Band",
                )
            })
            .collect()
    }

    fn counting(counter: Arc<AtomicUsize>) -> impl FnOnce(u64) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        move |_| {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[rstest]
    fn test_fifo_order(tracks: Vec<Track>) {
        let mut state = GuildPlaybackState::new();
        for (i, track) in tracks.iter().cloned().enumerate() {
            assert_eq!(state.enqueue(track), i + 1);
        }

        let played: Vec<Track> = std::iter::from_fn(|| state.dequeue_next()).collect();

        assert_eq!(played, tracks);
        assert!(state.is_empty());
    }

    #[rstest]
    fn test_clear_queue_reports_count(tracks: Vec<Track>) {
        let mut state = GuildPlaybackState::new();
        tracks.into_iter().for_each(|t| {
            state.enqueue(t);
        });

        assert_eq!(state.clear_queue(), 3);
        assert_eq!(state.clear_queue(), 0);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(2, 2)]
    #[case(10, 3)]
    fn test_upcoming_is_limited(tracks: Vec<Track>, #[case] limit: usize, #[case] expected: usize) {
        let mut state = GuildPlaybackState::new();
        tracks.into_iter().for_each(|t| {
            state.enqueue(t);
        });

        assert_eq!(state.upcoming(limit).len(), expected);
    }

    #[test]
    fn test_take_active_player_if_matches_id() {
        let mut state = GuildPlaybackState::new();
        let track = Track::new("Song", "https://example.com", "Band");
        state.set_active_player(Some(ActivePlayer {
            id: 5,
            track: track.clone(),
        }));

        assert_eq!(state.take_active_player_if(4), None);
        assert_eq!(
            state.take_active_player_if(5),
            Some(ActivePlayer { id: 5, track })
        );
        assert!(state.active_player().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_cancels_armed_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut state = GuildPlaybackState::new();

        state.arm_idle_timer(Duration::from_secs(60), counting(Arc::clone(&fired)));
        assert!(state.has_idle_timer());

        state.enqueue(Track::new("Song", "https://example.com", "Band"));
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(!state.has_idle_timer());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_previous_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut state = GuildPlaybackState::new();

        let first = state.arm_idle_timer(Duration::from_secs(60), counting(Arc::clone(&fired)));
        let second = state.arm_idle_timer(Duration::from_secs(60), counting(Arc::clone(&fired)));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_ne!(first, second);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!state.take_fired_timer(first));
        assert!(state.take_fired_timer(second));
        assert!(!state.has_idle_timer());
    }

    #[test]
    fn test_mark_discarded_clears_everything() {
        let mut state = GuildPlaybackState::new();
        state.enqueue(Track::new("Song", "https://example.com", "Band"));
        state.set_phase(PlaybackPhase::Playing);

        state.mark_discarded();

        assert!(state.is_discarded());
        assert!(state.is_vacant());
        assert_eq!(state.phase(), PlaybackPhase::Idle);
    }
}
