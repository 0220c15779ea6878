use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long the bot stays in a voice channel after the queue runs dry.
pub const IDLE_LEAVE_DELAY: Duration = Duration::from_secs(5 * 60);

/// A one-shot delayed task, tagged with the generation it was armed under.
///
/// Cancelling aborts the task. A timer that already fired is released with
/// [`IdleTimer::release`] instead, since the task would be aborting itself.
#[derive(Debug)]
pub struct IdleTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl IdleTimer {
    /// Spawns a task that waits `delay` and then runs `on_fire`.
    pub fn spawn<F>(generation: u64, delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });

        Self { generation, handle }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Aborts the pending task. No-op if it already completed.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Drops the handle without aborting; used from inside the fired task.
    pub fn release(self) {
        drop(self.handle);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
