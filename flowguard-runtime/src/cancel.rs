//! Result-level cancellation.
//!
//! [`with_cancel`] wraps a task in an outcome filter. Cancelling does **not**
//! stop the wrapped work: the task still runs to completion when the wrapper
//! is awaited, and only the delivered outcome changes. Work that must stop
//! early has to watch [`CancelHandle::cancelled`] itself.

use flowguard_core::CancelledError;
use metrics::counter;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Voids the outcome of the task it was created with.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Request cancellation. Idempotent; no effect once the outcome was delivered.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Task cancellation requested");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Task returned by [`with_cancel`].
///
/// Settles when the wrapped task settles. If cancellation was requested at
/// any point before that, the outcome is replaced by [`CancelledError`],
/// whether the wrapped task succeeded or failed.
#[must_use = "futures do nothing unless awaited"]
pub struct CancellableTask<F> {
    inner: Pin<Box<F>>,
    token: CancellationToken,
}

impl<F> std::fmt::Debug for CancellableTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableTask")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<F, T, E> Future for CancellableTask<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<CancelledError>,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = ready!(self.inner.as_mut().poll(cx));

        if self.token.is_cancelled() {
            counter!("flowguard_cancelled_total").increment(1);
            Poll::Ready(Err(E::from(CancelledError)))
        } else {
            Poll::Ready(outcome)
        }
    }
}

/// Wrap `future` so its eventual outcome can be voided.
///
/// Returns immediately without polling the task.
pub fn with_cancel<F, T, E>(future: F) -> (CancellableTask<F>, CancelHandle)
where
    F: Future<Output = Result<T, E>>,
    E: From<CancelledError>,
{
    let handle = CancelHandle::default();
    let task = CancellableTask {
        inner: Box::pin(future),
        token: handle.token.clone(),
    };
    (task, handle)
}
