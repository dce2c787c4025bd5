use flowguard_core::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;
use test_case::test_case;
use validator::Validate;

// ===== Defaults =====

#[test]
fn test_retry_config_default() {
    let config = RetryConfig::default();

    assert_eq!(config.attempts, 3);
    assert_eq!(config.base_delay(), Duration::from_secs(1));
    assert!(config.backoff);
    assert_eq!(config.max_delay(), None);
}

#[test]
fn test_batch_config_default() {
    let config = BatchConfig::default();

    assert_eq!(config.group_size, 10);
    assert_eq!(config.inter_group_delay(), Duration::ZERO);
    assert_eq!(config.concurrency, None);
    assert_eq!(config.effective_concurrency(), 10);
}

#[test]
fn test_timeout_config_default() {
    let config = TimeoutConfig::default();

    assert_eq!(config.default_timeout(), Duration::from_secs(30));
    assert_eq!(config.message, "Operation timed out");
}

#[test]
fn test_flow_config_default_is_valid() {
    assert!(FlowConfig::default().validate().is_ok());
}

// ===== Validation =====

#[test_case(0, false ; "zero attempts rejected")]
#[test_case(1, true ; "single attempt accepted")]
#[test_case(10, true ; "many attempts accepted")]
fn test_retry_attempts_validation(attempts: u32, valid: bool) {
    let config = RetryConfig {
        attempts,
        ..Default::default()
    };
    assert_eq!(config.validate().is_ok(), valid);
}

#[test]
fn test_rate_limit_validation() {
    assert!(RateLimitConfig::new(2, Duration::from_secs(1)).validate().is_ok());
    assert!(RateLimitConfig::new(0, Duration::from_secs(1)).validate().is_err());
    assert!(RateLimitConfig::new(2, Duration::ZERO).validate().is_err());
}

#[test]
fn test_batch_validation() {
    assert!(BatchConfig::new(0).validate().is_err());
    assert!(BatchConfig::new(3).with_concurrency(0).validate().is_err());
    assert!(BatchConfig::new(3).with_concurrency(1).validate().is_ok());
}

#[test]
fn test_nested_validation_reports_core_error() {
    let input = r#"
        [batch]
        group_size = 0
    "#;

    let err = FlowConfig::from_toml_str(input).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

// ===== Parsing =====

#[test]
fn test_partial_toml_keeps_defaults() {
    let input = r#"
        [retry]
        attempts = 5
        backoff = false

        [rate_limit]
        max_calls = 2
        per_interval_ms = 500
    "#;

    let config = FlowConfig::from_toml_str(input).unwrap();

    assert_eq!(config.retry.attempts, 5);
    assert!(!config.retry.backoff);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.rate_limit.max_calls, 2);
    assert_eq!(config.rate_limit.per_interval(), Duration::from_millis(500));
    assert_eq!(config.batch, BatchConfig::default());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = FlowConfig::from_toml_str("[retry\nattempts = ").unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
        [batch]
        group_size = 4
        inter_group_delay_ms = 250
        concurrency = 2

        [timeout]
        default_ms = 1500
        message = "upstream too slow"
        "#
    )
    .unwrap();

    let config = FlowConfig::load_from(file.path()).unwrap();

    assert_eq!(config.batch.group_size, 4);
    assert_eq!(config.batch.inter_group_delay(), Duration::from_millis(250));
    assert_eq!(config.batch.effective_concurrency(), 2);
    assert_eq!(config.timeout.default_timeout(), Duration::from_millis(1500));
    assert_eq!(config.timeout.message, "upstream too slow");
}

#[test]
fn test_config_json_roundtrip() {
    let config = FlowConfig {
        retry: RetryConfig::new(4, Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2)),
        ..Default::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    let parsed: FlowConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, config);
}
