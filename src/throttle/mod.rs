use std::{fmt, future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::oneshot;

use self::{
    slot::SlotGuard,
    state::{Job, Shared},
};

mod slot;
mod state;
mod submission;

pub use submission::Submission;

/// Runs submitted asynchronous tasks with a cap on how many are in flight at
/// once.
///
/// Tasks are queued in submission order and started in strict FIFO order: as
/// soon as fewer than `limit` are in flight, evaluated on every submission,
/// whenever a running task settles, and on a periodic tick every `interval`.
/// Each submission gets its own [`Submission`] future which mirrors the
/// task's outcome exactly; one task failing has no effect on its siblings.
///
/// The ticker only runs while there is work to watch. Once the queue is
/// empty and the last task has settled, it cancels itself and the throttle
/// goes dormant, consuming no background resources until the next
/// submission.
///
/// Cheaply cloneable: clones are handles to the same scheduler. Separate
/// [`Throttle::new`] instances share nothing.
#[derive(Clone)]
pub struct Throttle {
    shared: Arc<Shared>,
}

/// The configured concurrency limit does not allow any task to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("limit must be greater than 0")]
pub struct InvalidConfiguration;

/// A snapshot of the state of a [`Throttle`], taken under its state lock.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleState {
    active: usize,
    queued: usize,
    ticking: bool,
}

impl Throttle {
    /// Creates a throttle running at most `limit` tasks concurrently, with
    /// queued work re-checked for admission every `interval`.
    ///
    /// Fails with [`InvalidConfiguration`] if `limit` is zero. A zero
    /// `interval` is accepted and degenerates to re-checking admission on
    /// every pass of the scheduler.
    pub fn new(limit: usize, interval: Duration) -> Result<Self, InvalidConfiguration> {
        if limit < 1 {
            return Err(InvalidConfiguration);
        }
        Ok(Self {
            shared: Arc::new(Shared::new(limit, interval)),
        })
    }

    /// Queues `task` and returns a future resolving with its output.
    ///
    /// The task is appended to the back of the queue and started as soon as
    /// a slot is free: immediately on this call if fewer than `limit` tasks
    /// are in flight, otherwise when a running task settles or on the next
    /// tick, whichever comes first. The returned [`Submission`] mirrors the
    /// task's own outcome; dropping it does not cancel the task.
    ///
    /// Must be called within a Tokio runtime context.
    pub fn submit<F, Fut>(&self, task: F) -> Submission<Fut::Output>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let shared = Arc::clone(&self.shared);
        let job: Job = Box::new(move || {
            let slot = SlotGuard::new(shared);
            tokio::spawn(async move {
                let _slot = slot;
                // The receiver may have been dropped; the task still ran.
                let _ = tx.send(task().await);
            });
        });

        self.shared.enqueue(job);
        self.shared.ensure_ticker();
        self.shared.drain();

        Submission::new(rx)
    }

    /// The current state of the throttle.
    pub fn state(&self) -> ThrottleState {
        self.shared.snapshot()
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("limit", &self.shared.limit)
            .field("interval", &self.shared.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl ThrottleState {
    /// The number of tasks currently executing.
    pub fn active(&self) -> usize {
        self.active
    }

    /// The number of tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Whether the periodic admission ticker is currently running.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }
}
