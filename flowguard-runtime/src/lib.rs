//! Async control-flow combinators.
//!
//! Every combinator consumes a task, any `Future<Output = Result<T, E>>`,
//! and returns a new one. Synthetic failures are converted into the caller's
//! error type through `From<TimeoutError>` / `From<CancelledError>`, so the
//! combinators compose over a single error type such as
//! [`AppError`](flowguard_core::AppError).
//!
//! ```no_run
//! use flowguard_core::{AppError, RetryConfig};
//! use flowguard_runtime::{retry, TaskExt};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), AppError> {
//! let config = RetryConfig::new(3, Duration::from_millis(200));
//!
//! let body = retry(&config, || {
//!     async { Ok::<_, AppError>("pong".to_string()) }.deadline(Duration::from_secs(2))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cancel;
pub mod hooks;
pub mod logging;
pub mod rate_limit;
pub mod retry;
pub mod task;
pub mod timeout;

pub use batch::batch;
pub use cancel::{with_cancel, CancelHandle, CancellableTask};
pub use hooks::{
    install_panic_hook, spawn_reported, FailureHooks, FailureOrigin, FailureReport, HookError,
};
pub use logging::{init_default_logging, init_logging, LogConfig, LogFormat, LoggingError};
pub use rate_limit::{rate_limit, RateLimiter};
pub use retry::{retry, retry_with_observer};
pub use task::{Outcome, Task, TaskExt};
pub use timeout::{with_default_timeout, with_timeout, with_timeout_message};
