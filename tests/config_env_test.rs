//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy when present, so the tests only assert on variables they set.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use ops_investigator::config::{Config, LogFormat};
use ops_investigator::AppError;
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let result = Config::from_env();
    assert!(result.is_ok(), "defaults should always validate");
}

#[test]
#[serial]
fn test_config_from_env_custom_investigation() {
    env::set_var("INVESTIGATION_DEADLINE_MS", "1500");
    env::set_var("MEMORY_CAPACITY", "7");
    env::set_var("SIMILAR_LIMIT", "2");
    env::set_var("FALLBACK_MAX_STEPS", "3");
    env::set_var("PATTERN_CONFIDENCE_THRESHOLD", "0.4");

    let config = Config::from_env().unwrap();
    assert_eq!(config.investigation.deadline_ms, 1500);
    assert_eq!(config.investigation.deadline().as_millis(), 1500);
    assert_eq!(config.investigation.memory_capacity, 7);
    assert_eq!(config.investigation.similar_limit, 2);
    assert_eq!(config.investigation.fallback_max_steps, 3);
    assert_eq!(config.investigation.pattern_confidence_threshold, 0.4);

    env::remove_var("INVESTIGATION_DEADLINE_MS");
    env::remove_var("MEMORY_CAPACITY");
    env::remove_var("SIMILAR_LIMIT");
    env::remove_var("FALLBACK_MAX_STEPS");
    env::remove_var("PATTERN_CONFIDENCE_THRESHOLD");
}

#[test]
#[serial]
fn test_config_from_env_custom_executor() {
    env::set_var("EXECUTOR_PROGRAM", "/usr/local/bin/aws-collector");
    env::set_var("EXECUTOR_TIMEOUT_MS", "45000");
    env::set_var("EXECUTOR_MAX_CONCURRENCY", "2");

    let config = Config::from_env().unwrap();
    assert_eq!(config.executor.program, "/usr/local/bin/aws-collector");
    assert_eq!(config.executor.timeout_ms, 45000);
    assert_eq!(config.executor.max_concurrency, 2);

    env::remove_var("EXECUTOR_PROGRAM");
    env::remove_var("EXECUTOR_TIMEOUT_MS");
    env::remove_var("EXECUTOR_MAX_CONCURRENCY");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_unparsable_number_uses_default() {
    env::set_var("SIMILAR_LIMIT", "lots");

    let config = Config::from_env().unwrap();
    assert_eq!(config.investigation.similar_limit, 5);

    env::remove_var("SIMILAR_LIMIT");
}

#[test]
#[serial]
fn test_config_from_env_zero_capacity_is_rejected() {
    env::set_var("MEMORY_CAPACITY", "0");

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { .. })));

    env::remove_var("MEMORY_CAPACITY");
}

#[test]
#[serial]
fn test_config_from_env_threshold_out_of_range_is_rejected() {
    env::set_var("PATTERN_CONFIDENCE_THRESHOLD", "1.5");

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { .. })));

    env::remove_var("PATTERN_CONFIDENCE_THRESHOLD");
}
