use std::sync::Arc;

use super::state::Shared;

/// Occupies one concurrency slot while a task runs.
///
/// Created when a task is started and dropped when it settles, whether the
/// task resolved, failed or panicked. The slot is released on drop so a
/// panicking task cannot leak capacity.
pub(crate) struct SlotGuard {
    shared: Arc<Shared>,
}

impl SlotGuard {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.shared.release_slot();
    }
}
