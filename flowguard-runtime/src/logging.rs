//! Structured logging setup.
//!
//! The combinators only emit `debug`/`trace` events; nothing shows up unless
//! the host installs a subscriber. [`init_logging`] installs one for
//! applications that have none of their own.
//!
//! ```rust,no_run
//! use flowguard_runtime::logging::{init_logging, LogConfig, LogFormat};
//!
//! let config = LogConfig {
//!     format: LogFormat::Compact,
//!     level: "debug".to_string(),
//!     filter: Some("flowguard_runtime=trace".to_string()),
//! };
//! init_logging(config).expect("Failed to initialize logging");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production (machine-readable)
    Json,
    /// Pretty format for development (human-readable)
    Pretty,
    /// Compact format for minimal output
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Default level when neither `filter` nor `RUST_LOG` is set
    pub level: String,
    /// Per-module directives, e.g. "flowguard_runtime=trace,tokio=warn"
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            filter: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

impl LogConfig {
    /// Resolve the filter: explicit directives, then `RUST_LOG`, then `level`.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let filter = match self.filter {
            Some(ref directives) => EnvFilter::try_new(directives)?,
            None => match EnvFilter::try_from_default_env() {
                Ok(filter) => filter,
                Err(_) => EnvFilter::try_new(&self.level)?,
            },
        };
        Ok(filter)
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

impl LogFormat {
    /// Formatting layer for this format. Every format reports span closes.
    fn layer(self) -> BoxedLayer {
        let base = fmt::layer().with_span_events(FmtSpan::CLOSE);

        match self {
            LogFormat::Json => base
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .boxed(),
            LogFormat::Pretty => base
                .pretty()
                .with_thread_ids(true)
                .with_thread_names(true)
                .boxed(),
            LogFormat::Compact => base.compact().boxed(),
        }
    }
}

/// Install the global subscriber.
///
/// Fails with [`LoggingError::Init`] if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(config.format.layer().with_filter(env_filter))
        .try_init()?;

    info!("Logging system initialized with format: {:?}", config.format);
    Ok(())
}

/// Initialize logging with default configuration
pub fn init_default_logging() -> Result<(), LoggingError> {
    init_logging(LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();

        #[cfg(debug_assertions)]
        assert_eq!(config.format, LogFormat::Pretty);

        #[cfg(not(debug_assertions))]
        assert_eq!(config.format, LogFormat::Json);

        assert_eq!(config.level, "info");
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_every_format_builds_a_layer() {
        for format in [LogFormat::Json, LogFormat::Pretty, LogFormat::Compact] {
            let filtered = format.layer().with_filter(EnvFilter::new("debug"));
            let _subscriber = tracing_subscriber::registry().with(filtered);
        }
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            filter: Some("flowguard=notalevel".to_string()),
            ..Default::default()
        };

        assert!(matches!(config.env_filter(), Err(LoggingError::Filter(_))));
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LogConfig =
            serde_json::from_str(r#"{"format": "compact", "level": "debug"}"#).unwrap();

        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, "debug");
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig {
            format: LogFormat::Compact,
            filter: Some("warn".to_string()),
            ..Default::default()
        };

        let _ = init_logging(config.clone());
        assert!(matches!(init_logging(config), Err(LoggingError::Init(_))));
    }
}
