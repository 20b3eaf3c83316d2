use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub investigation: InvestigationConfig,
    pub executor: ExecutorConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Investigation orchestration settings
#[derive(Debug, Clone)]
pub struct InvestigationConfig {
    /// Overall deadline for one investigation
    pub deadline_ms: u64,
    /// Number of past investigations kept in memory
    pub memory_capacity: usize,
    /// Maximum similar investigations recalled per query
    pub similar_limit: usize,
    /// Step budget for the sequential fallback loop
    pub fallback_max_steps: usize,
    /// Confidence above which a successful investigation reinforces a pattern
    pub pattern_confidence_threshold: f64,
}

/// External operation executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Program invoked once per operation
    pub program: String,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = InvestigationConfig::default();
        let investigation = InvestigationConfig {
            deadline_ms: parse_env("INVESTIGATION_DEADLINE_MS").unwrap_or(defaults.deadline_ms),
            memory_capacity: parse_env("MEMORY_CAPACITY").unwrap_or(defaults.memory_capacity),
            similar_limit: parse_env("SIMILAR_LIMIT").unwrap_or(defaults.similar_limit),
            fallback_max_steps: parse_env("FALLBACK_MAX_STEPS")
                .unwrap_or(defaults.fallback_max_steps),
            pattern_confidence_threshold: parse_env("PATTERN_CONFIDENCE_THRESHOLD")
                .unwrap_or(defaults.pattern_confidence_threshold),
        };

        let defaults = ExecutorConfig::default();
        let executor = ExecutorConfig {
            program: env::var("EXECUTOR_PROGRAM").unwrap_or(defaults.program),
            timeout_ms: parse_env("EXECUTOR_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_concurrency: parse_env("EXECUTOR_MAX_CONCURRENCY")
                .unwrap_or(defaults.max_concurrency),
        };

        let config = Config {
            logging,
            investigation,
            executor,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.investigation.memory_capacity == 0 {
            return Err(AppError::Config {
                message: "MEMORY_CAPACITY must be greater than zero".to_string(),
            });
        }
        if self.investigation.fallback_max_steps == 0 {
            return Err(AppError::Config {
                message: "FALLBACK_MAX_STEPS must be greater than zero".to_string(),
            });
        }
        if self.executor.max_concurrency == 0 {
            return Err(AppError::Config {
                message: "EXECUTOR_MAX_CONCURRENCY must be greater than zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.investigation.pattern_confidence_threshold) {
            return Err(AppError::Config {
                message: "PATTERN_CONFIDENCE_THRESHOLD must be within 0.0..=1.0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl InvestigationConfig {
    /// Overall deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 300_000,
            memory_capacity: 100,
            similar_limit: 5,
            fallback_max_steps: 5,
            pattern_confidence_threshold: 0.7,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "ops-collector".to_string(),
            timeout_ms: 30_000,
            max_concurrency: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
