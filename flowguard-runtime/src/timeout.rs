//! Deadlines for async operations.
//!
//! # Example
//!
//! ```no_run
//! use flowguard_core::AppError;
//! use flowguard_runtime::timeout::with_timeout;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), AppError> {
//! let value = with_timeout(Duration::from_secs(5), async {
//!     // Your async operation
//!     Ok::<_, AppError>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use flowguard_core::{TimeoutConfig, TimeoutError, DEFAULT_TIMEOUT_MESSAGE};
use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Apply a deadline to an async operation.
///
/// The operation is polled before the deadline is checked, so a task that is
/// already settled wins even with a zero duration. When the deadline fires
/// first the operation is dropped and its eventual outcome is never observed.
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    with_timeout_message(duration, DEFAULT_TIMEOUT_MESSAGE, future).await
}

/// Like [`with_timeout`], failing with `message` on expiry
///
/// `message` is converted up front; the returned future only holds a `String`.
pub fn with_timeout_message<F, T, E>(
    duration: Duration,
    message: impl Into<String>,
    future: F,
) -> impl Future<Output = Result<T, E>>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    let message: String = message.into();

    async move {
        match timeout(duration, future).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                debug!("Operation timed out after {:?}", duration);
                counter!("flowguard_timeouts_total").increment(1);
                Err(TimeoutError::new(message, duration).into())
            }
        }
    }
}

/// Apply the configured default deadline and message
pub async fn with_default_timeout<F, T, E>(config: &TimeoutConfig, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    with_timeout_message(config.default_timeout(), config.message.clone(), future).await
}
