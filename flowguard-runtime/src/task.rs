//! The deferred computation every combinator consumes.
//!
//! Any `Future<Output = Result<T, E>>` is a task. Futures are lazy and are
//! consumed when awaited, so a task cannot be reused after it settles; the
//! retry engine and rate limiter take a factory that builds a fresh one per
//! attempt or call.

use flowguard_core::{CancelledError, TimeoutError, DEFAULT_TIMEOUT_MESSAGE};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::cancel::{with_cancel, CancelHandle, CancellableTask};
use crate::timeout::with_timeout_message;

/// Result of a settled task. Exactly one variant is populated.
pub type Outcome<T, E> = Result<T, E>;

/// A type-erased task that can be stored, sent across threads and spawned.
pub struct Task<T, E> {
    inner: BoxFuture<'static, Outcome<T, E>>,
}

impl<T, E> Task<T, E> {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Outcome<T, E>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Defer a closure until the task is first polled
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Outcome<T, E>> + Send + 'static,
    {
        Self::new(async move { f().await })
    }

    /// A task that is already settled with `value`
    pub fn ok(value: T) -> Self
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        Self::new(futures::future::ready(Ok(value)))
    }

    /// A task that is already settled with `error`
    pub fn err(error: E) -> Self
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        Self::new(futures::future::ready(Err(error)))
    }
}

impl<T, E> Future for Task<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Combinator methods on any task.
pub trait TaskExt<T, E>: Future<Output = Outcome<T, E>> + Sized {
    /// Erase the concrete future type
    fn boxed_task(self) -> Task<T, E>
    where
        Self: Send + 'static,
    {
        Task::new(self)
    }

    /// Race this task against a deadline with the default timeout message
    fn deadline(self, duration: Duration) -> Task<T, E>
    where
        Self: Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        self.deadline_with_message(duration, DEFAULT_TIMEOUT_MESSAGE)
    }

    /// Race this task against a deadline, failing with `message` on expiry
    fn deadline_with_message(self, duration: Duration, message: impl Into<String>) -> Task<T, E>
    where
        Self: Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        let message: String = message.into();
        Task::new(with_timeout_message(duration, message, self))
    }

    /// Wrap this task so its outcome can be voided through the returned handle
    fn cancellable(self) -> (CancellableTask<Self>, CancelHandle)
    where
        E: From<CancelledError>,
    {
        with_cancel(self)
    }
}

impl<F, T, E> TaskExt<T, E> for F where F: Future<Output = Outcome<T, E>> {}
