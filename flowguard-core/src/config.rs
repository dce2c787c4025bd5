//! Configuration for the control-flow combinators.
//!
//! Durations are stored as milliseconds so the types deserialize from TOML,
//! JSON and environment variables alike; the accessors return [`Duration`].

use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::error::{CoreError, Result, DEFAULT_TIMEOUT_MESSAGE};

/// Environment variable prefix, e.g. `FLOWGUARD_RETRY__ATTEMPTS=5`
pub const ENV_PREFIX: &str = "FLOWGUARD";

// ===== Retry =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    #[validate(range(min = 1))]
    pub attempts: u32,
    /// Delay before the second attempt; doubles per attempt when `backoff` is set
    pub base_delay_ms: u64,
    /// Exponential backoff (`base * 2^(attempt-1)`) instead of a constant delay
    pub backoff: bool,
    /// Upper bound on a single delay
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1000,
            backoff: true,
            max_delay_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = Some(max_delay.as_millis() as u64);
        self
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }

    /// Delay to wait after the failed `attempt` (1-based) before the next one.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay();
        let delay = if self.backoff {
            let exponent = attempt.saturating_sub(1).min(31);
            base.saturating_mul(1u32 << exponent)
        } else {
            base
        };

        match self.max_delay() {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

// ===== Rate limiting =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Admissions allowed per window
    #[validate(range(min = 1))]
    pub max_calls: u32,
    /// Window length
    #[validate(range(min = 1))]
    pub per_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 10,
            per_interval_ms: 1000,
        }
    }
}

impl RateLimitConfig {
    /// Sub-millisecond intervals round up to the next whole millisecond.
    pub fn new(max_calls: u32, per_interval: Duration) -> Self {
        Self {
            max_calls,
            per_interval_ms: per_interval.as_nanos().div_ceil(1_000_000) as u64,
        }
    }

    pub fn per_interval(&self) -> Duration {
        Duration::from_millis(self.per_interval_ms)
    }
}

// ===== Batching =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per group; the last group may be smaller
    #[validate(range(min = 1))]
    pub group_size: usize,
    /// Pause between consecutive groups
    pub inter_group_delay_ms: u64,
    /// Items in flight within a group. Defaults to `group_size`.
    #[validate(range(min = 1))]
    pub concurrency: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 10,
            inter_group_delay_ms: 0,
            concurrency: None,
        }
    }
}

impl BatchConfig {
    pub fn new(group_size: usize) -> Self {
        Self {
            group_size,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_group_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn inter_group_delay(&self) -> Duration {
        Duration::from_millis(self.inter_group_delay_ms)
    }

    /// Effective in-flight limit, never zero and never above the group size
    pub fn effective_concurrency(&self) -> usize {
        let group = self.group_size.max(1);
        self.concurrency.unwrap_or(group).clamp(1, group)
    }
}

// ===== Timeouts =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimeoutConfig {
    pub default_ms: u64,
    #[validate(length(min = 1))]
    pub message: String,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 30_000,
            message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
        }
    }
}

impl TimeoutConfig {
    pub fn new(default: Duration) -> Self {
        Self {
            default_ms: default.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }
}

// ===== Aggregate =====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FlowConfig {
    #[validate(nested)]
    pub retry: RetryConfig,
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub batch: BatchConfig,
    #[validate(nested)]
    pub timeout: TimeoutConfig,
}

impl FlowConfig {
    /// Load from `config/default`, `config/local` and `FLOWGUARD_*` variables,
    /// later sources overriding earlier ones.
    pub fn load() -> Result<Self> {
        let loader = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        Self::finish(loader)
    }

    /// Load a single file (format picked from its extension), then apply
    /// environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::builder()
            .add_source(File::from(path))
            .add_source(env_source())
            .build()?;

        tracing::debug!("loading flowguard config from {}", path.display());
        Self::finish(loader)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: FlowConfig = toml::from_str(input)?;
        config.validated()
    }

    pub fn validated(self) -> Result<Self> {
        self.validate().map_err(CoreError::from)?;
        Ok(self)
    }

    fn finish(loader: ConfigLoader) -> Result<Self> {
        let config: FlowConfig = loader.try_deserialize()?;
        config.validated()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
