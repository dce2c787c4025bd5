//! Retry with optional exponential backoff.
//!
//! # Example
//!
//! ```no_run
//! use flowguard_core::{AppError, RetryConfig};
//! use flowguard_runtime::retry::retry_with_observer;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), AppError> {
//! let config = RetryConfig::new(5, Duration::from_millis(100));
//!
//! let value = retry_with_observer(
//!     &config,
//!     || async {
//!         // Your operation here
//!         Ok::<_, AppError>(42)
//!     },
//!     |attempt, err| eprintln!("attempt {} failed: {}", attempt, err),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use flowguard_core::RetryConfig;
use metrics::counter;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Retry an operation until it succeeds or the attempt budget runs out.
///
/// `f` is called once per attempt to build a fresh task. The error surfaced on
/// exhaustion is the one returned by the last attempt.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_observer(config, f, |_, _| {}).await
}

/// Retry an operation, calling `on_retry(attempt, &error)` after each failed
/// attempt that will be retried, before the backoff delay.
///
/// `attempt` is 1-based. The observer is not called for the final failure.
pub async fn retry_with_observer<F, Fut, T, E, O>(
    config: &RetryConfig,
    mut f: F,
    mut on_retry: O,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(u32, &E),
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    loop {
        trace!("Retry attempt {}/{}", attempt, attempts);
        counter!("flowguard_retry_attempts_total").increment(1);

        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Operation succeeded after {} attempts", attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= attempts => {
                debug!("Retry budget of {} attempts exhausted", attempts);
                return Err(e);
            }
            Err(e) => {
                on_retry(attempt, &e);

                let delay = config.delay_for_attempt(attempt);
                debug!("Attempt {} failed, retrying after {:?}", attempt, delay);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_retry_succeeds_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = retry(&RetryConfig::default(), || {
            let c = counter_clone.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Ok::<_, ()>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_never_waits() {
        let config = RetryConfig::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let mut observed = 0;

        let result = retry_with_observer(
            &config,
            || async { Err::<(), _>("nope") },
            |_, _| observed += 1,
        )
        .await;

        assert_eq!(result.unwrap_err(), "nope");
        assert_eq!(observed, 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_treated_as_one() {
        let config = RetryConfig {
            attempts: 0,
            ..Default::default()
        };
        let calls = AtomicUsize::new(0);

        let result = retry(&config, || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>("fail") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_delay_without_backoff() {
        let config = RetryConfig::new(4, Duration::from_millis(100)).with_backoff(false);
        let start = Instant::now();

        let result = retry(&config, || async { Err::<(), _>("fail") }).await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_is_surfaced() {
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let counter = AtomicUsize::new(0);

        let result = retry(&config, || {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            async move { Err::<(), _>(format!("failure {}", n)) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 3");
    }
}
