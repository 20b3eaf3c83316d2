use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Investigation error: {0}")]
    Investigation(#[from] InvestigationError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the external operation executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Operation {operation} cancelled")]
    Cancelled { operation: String },

    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Whether this error came from cooperative cancellation rather than the operation itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutorError::Cancelled { .. })
    }
}

/// Conditions that end or reject an investigation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvestigationError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Investigation deadline of {timeout_ms}ms exceeded")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error("Investigation cancelled")]
    Cancelled,
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "MEMORY_CAPACITY must be positive".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: MEMORY_CAPACITY must be positive"
        );

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_executor_error_display() {
        let err = ExecutorError::OperationFailed {
            operation: "error_events".to_string(),
            message: "exit status 2".to_string(),
        };
        assert_eq!(err.to_string(), "Operation error_events failed: exit status 2");

        let err = ExecutorError::Timeout {
            operation: "services".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Operation services timed out after 5000ms");

        let err = ExecutorError::Cancelled {
            operation: "series".to_string(),
        };
        assert_eq!(err.to_string(), "Operation series cancelled");
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_investigation_error_display() {
        assert_eq!(
            InvestigationError::EmptyQuery.to_string(),
            "Query must not be empty"
        );
        assert_eq!(
            InvestigationError::DeadlineExceeded { timeout_ms: 250 }.to_string(),
            "Investigation deadline of 250ms exceeded"
        );
    }

    #[test]
    fn test_executor_error_conversion_to_app_error() {
        let err = ExecutorError::Spawn {
            program: "ops-collector".to_string(),
            message: "not found".to_string(),
        };
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Executor(_)));
        assert!(app_err.to_string().contains("Failed to spawn ops-collector"));
    }

    #[test]
    fn test_investigation_error_conversion_to_app_error() {
        let app_err: AppError = InvestigationError::EmptyQuery.into();
        assert!(matches!(app_err, AppError::Investigation(_)));
    }
}
