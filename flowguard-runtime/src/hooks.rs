//! Process-level failure reporting.
//!
//! A [`FailureHooks`] holds at most one handler, registered once for its
//! whole lifetime. Failures reach it from two places:
//!
//! - panics, once [`install_panic_hook`] is called ([`FailureOrigin::Uncaught`])
//! - detached tasks started with [`spawn_reported`] that return `Err`
//!   ([`FailureOrigin::Unhandled`])
//!
//! Handlers can also be driven directly with [`FailureHooks::dispatch`].

use chrono::{DateTime, Utc};
use flowguard_core::ErrorLike;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::sync::{Once, OnceLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Where an unreported failure surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// A panic nobody caught
    Uncaught,
    /// An error returned by a detached task nobody awaited
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub message: String,
    pub code: Option<String>,
    pub status_code: Option<u16>,
    pub origin: FailureOrigin,
    pub occurred_at: DateTime<Utc>,
}

impl FailureReport {
    pub fn from_error<E>(error: &E, origin: FailureOrigin) -> Self
    where
        E: ErrorLike + ?Sized,
    {
        Self {
            message: error.to_string(),
            code: error.code().map(str::to_string),
            status_code: error.status_code(),
            origin,
            occurred_at: Utc::now(),
        }
    }

    /// Report for a panic payload
    pub fn from_panic(payload: &(dyn Any + Send), location: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let message = match location {
            Some(location) => format!("{} at {}", message, location),
            None => message,
        };

        Self {
            message,
            code: None,
            status_code: None,
            origin: FailureOrigin::Uncaught,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("A failure handler is already registered")]
    AlreadyRegistered,
}

type FailureHandler = Box<dyn Fn(&FailureReport) + Send + Sync>;

/// Set-once registration point for a failure handler.
pub struct FailureHooks {
    handler: OnceLock<FailureHandler>,
}

impl FailureHooks {
    pub const fn new() -> Self {
        Self {
            handler: OnceLock::new(),
        }
    }

    /// Register the handler. Only the first registration takes effect.
    pub fn register<H>(&self, handler: H) -> Result<(), HookError>
    where
        H: Fn(&FailureReport) + Send + Sync + 'static,
    {
        self.handler
            .set(Box::new(handler))
            .map_err(|_| HookError::AlreadyRegistered)?;
        info!("Failure handler registered");
        Ok(())
    }

    pub fn is_registered(&self) -> bool {
        self.handler.get().is_some()
    }

    /// Hand a report to the handler. Returns `false` when none is registered.
    pub fn dispatch(&self, report: &FailureReport) -> bool {
        match self.handler.get() {
            Some(handler) => {
                handler(report);
                true
            }
            None => {
                debug!("No failure handler registered, dropping {:?} report", report.origin);
                false
            }
        }
    }
}

impl Default for FailureHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FailureHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureHooks")
            .field("registered", &self.is_registered())
            .finish()
    }
}

static GLOBAL_HOOKS: FailureHooks = FailureHooks::new();

/// The process-wide hooks
pub fn global() -> &'static FailureHooks {
    &GLOBAL_HOOKS
}

static PANIC_HOOK: Once = Once::new();

/// Route panics to [`global`] hooks, then to the previously installed panic hook.
///
/// See [`install_panic_hook_to`].
pub fn install_panic_hook() -> bool {
    install_panic_hook_to(global())
}

/// Route panics to `hooks`, then to the previously installed panic hook.
///
/// Only the first call in a process installs anything; later calls return
/// `false` and leave the existing hook in place, so a panic is never reported
/// twice.
pub fn install_panic_hook_to(hooks: &'static FailureHooks) -> bool {
    let mut installed = false;

    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map(|l| l.to_string());
            hooks.dispatch(&FailureReport::from_panic(info.payload(), location));
            previous(info);
        }));
        installed = true;
    });

    if !installed {
        debug!("Panic hook already installed");
    }
    installed
}

/// Spawn a detached task whose error is reported to [`global`] hooks.
pub fn spawn_reported<F, T, E>(future: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: ErrorLike + Send + 'static,
{
    spawn_reported_to(global(), future)
}

/// Spawn a detached task whose error is reported to `hooks`.
///
/// The handle yields `Some(value)` on success and `None` once the error has
/// been reported.
pub fn spawn_reported_to<F, T, E>(
    hooks: &'static FailureHooks,
    future: F,
) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: ErrorLike + Send + 'static,
{
    tokio::spawn(async move {
        match future.await {
            Ok(value) => Some(value),
            Err(err) => {
                hooks.dispatch(&FailureReport::from_error(&err, FailureOrigin::Unhandled));
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowguard_core::{AppError, TimeoutError};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording_hooks() -> (&'static FailureHooks, Arc<Mutex<Vec<FailureReport>>>) {
        let hooks: &'static FailureHooks = Box::leak(Box::new(FailureHooks::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hooks
            .register(move |report| sink.lock().unwrap().push(report.clone()))
            .unwrap();
        (hooks, seen)
    }

    #[test]
    fn test_register_is_set_once() {
        let hooks = FailureHooks::new();
        assert!(!hooks.is_registered());
        assert!(hooks.register(|_| {}).is_ok());
        assert_eq!(hooks.register(|_| {}), Err(HookError::AlreadyRegistered));
        assert!(hooks.is_registered());
    }

    #[test]
    fn test_dispatch_without_handler() {
        let hooks = FailureHooks::new();
        let err = AppError::internal("boom");
        let report = FailureReport::from_error(&err, FailureOrigin::Uncaught);
        assert!(!hooks.dispatch(&report));
    }

    #[test]
    fn test_report_from_error_carries_classification() {
        let err = TimeoutError::new("slow", Duration::from_secs(1));
        let report = FailureReport::from_error(&err, FailureOrigin::Unhandled);

        assert_eq!(report.message, "slow");
        assert_eq!(report.code.as_deref(), Some("TIMEOUT"));
        assert_eq!(report.status_code, Some(408));
        assert_eq!(report.origin, FailureOrigin::Unhandled);
    }

    #[test]
    fn test_report_from_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        let location = Some("src/lib.rs:1:1".to_string());
        let report = FailureReport::from_panic(payload.as_ref(), location);

        assert_eq!(report.message, "index out of bounds at src/lib.rs:1:1");
        assert_eq!(report.origin, FailureOrigin::Uncaught);
    }

    #[tokio::test]
    async fn test_spawn_reported_dispatches_errors() {
        let (hooks, seen) = recording_hooks();

        let ok = spawn_reported_to(hooks, async { Ok::<_, AppError>(1) }).await.unwrap();
        let failed = spawn_reported_to(hooks, async { Err::<i32, _>(AppError::not_found("job 9")) })
            .await
            .unwrap();

        assert_eq!(ok, Some(1));
        assert_eq!(failed, None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "job 9");
        assert_eq!(seen[0].code.as_deref(), Some("NOT_FOUND"));
        assert_eq!(seen[0].origin, FailureOrigin::Unhandled);
    }

    #[test]
    fn test_report_serializes_origin() {
        let report = FailureReport::from_error(&AppError::internal("x"), FailureOrigin::Unhandled);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["origin"], "unhandled");
    }
}
