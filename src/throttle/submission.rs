use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

/// The pending result of a task handed to
/// [`Throttle::submit`](crate::Throttle::submit).
///
/// Resolves with the task's own output once the task has been started and
/// has settled, mirroring it exactly: no transformation, no error wrapping.
/// If the task panics, awaiting its `Submission` resurfaces the panic in the
/// awaiting caller and nowhere else.
///
/// Dropping a `Submission` does not withdraw or cancel the task; it still
/// runs to completion and its result is discarded.
pub struct Submission<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Submission<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }
}

impl<T> Future for Submission<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(output)) => Poll::Ready(output),
            // The sender is only ever dropped unused if the task body never
            // ran to completion.
            Poll::Ready(Err(_)) => {
                panic!("throttled task panicked or its runtime shut down before it settled")
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Submission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission").finish_non_exhaustive()
    }
}
