//! Structured error types shared by every flowguard crate.
//!
//! The combinators in `flowguard-runtime` never inspect these types. They only
//! require a failure type `E`, and produce [`TimeoutError`] / [`CancelledError`]
//! through `E: From<_>` when they must synthesise a failure. [`AppError`] is the
//! ready-made `E` most applications use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use validator::ValidationErrors;

/// Default message carried by a [`TimeoutError`].
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Operation timed out";

/// Classification code of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    Timeout,
    Cancelled,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Internal => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// HTTP-style status conventionally paired with this code.
    ///
    /// `Cancelled` maps to 499 (client closed request), which has no
    /// registered reason phrase but is widely understood by proxies.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCode::BadRequest | ErrorCode::Validation => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Timeout => 408,
            ErrorCode::Conflict => 409,
            ErrorCode::RateLimited => 429,
            ErrorCode::Cancelled => 499,
            ErrorCode::Internal => 500,
            ErrorCode::ServiceUnavailable => 503,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error-like value: a message plus optional classification.
///
/// This is the only contract the failure hooks need from an error.
pub trait ErrorLike: std::error::Error {
    /// Classification code, if the error carries one
    fn code(&self) -> Option<&str> {
        None
    }

    /// HTTP-style status code, if the error carries one
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Structured details, if any
    fn details(&self) -> Option<&serde_json::Value> {
        None
    }
}

/// Deadline expired before the wrapped task settled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TimeoutError {
    pub message: String,
    pub elapsed: Duration,
}

impl TimeoutError {
    pub fn new(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed,
        }
    }
}

impl ErrorLike for TimeoutError {
    fn code(&self) -> Option<&str> {
        Some(ErrorCode::Timeout.as_str())
    }

    fn status_code(&self) -> Option<u16> {
        Some(ErrorCode::Timeout.default_status())
    }
}

/// The task's outcome was suppressed by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Error)]
#[error("Operation cancelled")]
pub struct CancelledError;

impl ErrorLike for CancelledError {
    fn code(&self) -> Option<&str> {
        Some(ErrorCode::Cancelled.as_str())
    }

    fn status_code(&self) -> Option<u16> {
        Some(ErrorCode::Cancelled.default_status())
    }
}

/// Errors raised by the toolkit itself (configuration, serialization).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// General-purpose application error with a classification code and status.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AppError {
    code: ErrorCode,
    message: String,
    status_code: u16,
    details: Option<serde_json::Value>,
    #[source]
    source: Option<BoxError>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: code.default_status(),
            details: None,
            source: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, CancelledError.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Override the default status for this code
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Record the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> u16 {
        self.status_code
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }

    /// Expected failures (bad input, missing resources, deadlines) as opposed
    /// to programming errors.
    pub fn is_operational(&self) -> bool {
        self.code != ErrorCode::Internal
    }

    /// Serializable representation of this error
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code,
            message: self.message.clone(),
            status: self.status_code,
            details: self.details.clone(),
        }
    }
}

impl ErrorLike for AppError {
    fn code(&self) -> Option<&str> {
        Some(self.code.as_str())
    }

    fn status_code(&self) -> Option<u16> {
        Some(self.status_code)
    }

    fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }
}

impl From<TimeoutError> for AppError {
    fn from(err: TimeoutError) -> Self {
        let details = serde_json::json!({ "elapsed_ms": err.elapsed.as_millis() as u64 });
        AppError::timeout(err.message.clone()).with_details(details)
    }
}

impl From<CancelledError> for AppError {
    fn from(_: CancelledError) -> Self {
        AppError::cancelled()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => AppError::validation(msg),
            other => AppError::internal(other.to_string()).with_source(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::validation(format!("Validation failed: {}", errors))
    }
}

/// Wire-neutral representation of an [`AppError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_and_statuses() {
        assert_eq!(ErrorCode::Timeout.as_str(), "TIMEOUT");
        assert_eq!(ErrorCode::Cancelled.as_str(), "CANCELLED");
        assert_eq!(ErrorCode::Validation.default_status(), 400);
        assert_eq!(ErrorCode::RateLimited.default_status(), 429);
    }

    #[test]
    fn test_code_serde_matches_as_str() {
        for code in [
            ErrorCode::BadRequest,
            ErrorCode::Validation,
            ErrorCode::NotFound,
            ErrorCode::Internal,
            ErrorCode::ServiceUnavailable,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_timeout_error_is_classified() {
        let err = TimeoutError::new(DEFAULT_TIMEOUT_MESSAGE, Duration::from_millis(100));
        assert_eq!(err.to_string(), "Operation timed out");
        assert_eq!(err.code(), Some("TIMEOUT"));

        let app: AppError = err.into();
        assert_eq!(app.error_code(), ErrorCode::Timeout);
        assert_eq!(app.details().unwrap()["elapsed_ms"], 100);
    }

    #[test]
    fn test_cancelled_into_app_error() {
        let app: AppError = CancelledError.into();
        assert_eq!(app.error_code(), ErrorCode::Cancelled);
        assert_eq!(app.status(), 499);
        assert!(app.is_client_error());
    }

    #[test]
    fn test_internal_is_not_operational() {
        assert!(!AppError::internal("boom").is_operational());
        assert!(AppError::not_found("user").is_operational());
        assert!(AppError::internal("boom").is_server_error());
    }
}
