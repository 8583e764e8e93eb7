use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::ThrottleState;

/// A queued task, boxed up ready to start. Invoking it spawns the task body
/// onto the runtime.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// State shared between [`Throttle`](crate::Throttle) handles, the ticker
/// task and the slot guards of running tasks.
pub(crate) struct Shared {
    pub(crate) limit: usize,
    pub(crate) interval: Duration,

    state: Mutex<State>,
}

/// The queue, the active counter and the ticker handle, mutated only under
/// the lock in [`Shared`]. No await point is ever reached while the lock is
/// held, so queue and counter updates are atomic with respect to each other.
#[derive(Default)]
struct State {
    queue: VecDeque<Job>,
    active: usize,
    ticker: Option<JoinHandle<()>>,
}

impl Shared {
    pub(crate) fn new(limit: usize, interval: Duration) -> Self {
        Self {
            limit,
            interval,
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn enqueue(&self, job: Job) {
        self.lock().queue.push_back(job);
    }

    /// Starts the periodic admission ticker if it is not already running.
    pub(crate) fn ensure_ticker(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.ticker.is_none() {
            let shared = Arc::clone(self);
            state.ticker = Some(tokio::spawn(async move {
                loop {
                    if shared.interval.is_zero() {
                        // sleep(ZERO) is ready immediately and would never
                        // yield back to a current-thread runtime.
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(shared.interval).await;
                    }
                    shared.drain();
                }
            }));
            debug!(interval = ?self.interval, "admission ticker started");
        }
    }

    /// Promotes queued tasks into active execution while slots are
    /// available, then tears the ticker down if there is nothing left to
    /// watch.
    ///
    /// Invoked on submission, on task settlement and on every tick. All
    /// three paths serialise on the state lock, so drain attempts never
    /// interleave. Jobs are started only after the lock is released.
    pub(crate) fn drain(self: &Arc<Self>) {
        let mut starting = Vec::new();
        let idle_ticker = {
            let mut state = self.lock();
            while state.active < self.limit {
                match state.queue.pop_front() {
                    Some(job) => {
                        state.active += 1;
                        starting.push(job);
                    }
                    None => break,
                }
            }
            if !starting.is_empty() {
                trace!(
                    started = starting.len(),
                    active = state.active,
                    queued = state.queue.len(),
                    "admitted queued tasks"
                );
            }
            if state.queue.is_empty() && state.active == 0 {
                state.ticker.take()
            } else {
                None
            }
        };

        for job in starting {
            job();
        }

        if let Some(ticker) = idle_ticker {
            ticker.abort();
            debug!("admission ticker stopped");
        }
    }

    /// Returns a task's slot and immediately re-attempts admission, so freed
    /// capacity is never left waiting for the next tick.
    pub(crate) fn release_slot(self: &Arc<Self>) {
        self.lock().active -= 1;
        self.drain();
    }

    pub(crate) fn snapshot(&self) -> ThrottleState {
        let state = self.lock();
        ThrottleState {
            active: state.active,
            queued: state.queue.len(),
            ticking: state.ticker.is_some(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("throttle state lock poisoned: no drain should ever panic")
    }
}
