//! Executor that runs each operation as a child process.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{OperationExecutor, Parameters};
use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, ExecutorResult};

/// Runs `<program> <operation> --<key> <value>...` and returns its stdout.
///
/// String parameters are passed verbatim, every other value as compact JSON.
/// Children are killed when the operation is cancelled or times out.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ProcessExecutor {
    /// Create an executor from configuration.
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    /// Program invoked for each operation.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn build_args(operation: &str, parameters: &Parameters) -> Vec<String> {
        let mut args = Vec::with_capacity(1 + parameters.len() * 2);
        args.push(operation.to_string());
        for (key, value) in parameters {
            args.push(format!("--{}", key));
            args.push(match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        args
    }

    async fn run(&self, operation: &str, parameters: &Parameters) -> ExecutorResult<String> {
        let output = Command::new(&self.program)
            .args(Self::build_args(operation, parameters))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExecutorError::Spawn {
                    program: self.program.clone(),
                    message: e.to_string(),
                })
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ExecutorError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExecutorError::OperationFailed {
                operation: operation.to_string(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OperationExecutor for ProcessExecutor {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        parameters: &Parameters,
    ) -> ExecutorResult<String> {
        let start = Instant::now();
        let cancelled = || ExecutorError::Cancelled {
            operation: operation.to_string(),
        };

        let _permit = tokio::select! {
            permit = self.permits.acquire() => permit.map_err(|_| cancelled())?,
            _ = cancel.cancelled() => return Err(cancelled()),
        };

        let result = tokio::select! {
            result = self.run(operation, parameters) => result,
            _ = cancel.cancelled() => Err(cancelled()),
        };

        let latency = start.elapsed().as_millis();
        match &result {
            Ok(stdout) => debug!(
                operation = %operation,
                bytes = stdout.len(),
                latency_ms = latency,
                "Operation completed"
            ),
            Err(e) => warn!(
                operation = %operation,
                error = %e,
                latency_ms = latency,
                "Operation failed"
            ),
        }
        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor(program: &str, timeout_ms: u64) -> ProcessExecutor {
        ProcessExecutor::new(&ExecutorConfig {
            program: program.to_string(),
            timeout_ms,
            max_concurrency: 2,
        })
    }

    #[test]
    fn test_build_args_formats_values() {
        let mut params = Parameters::new();
        params.insert("filter_pattern".to_string(), json!("ERROR"));
        params.insert("limit".to_string(), json!(10));
        params.insert("services".to_string(), json!(["lambda"]));

        let args = ProcessExecutor::build_args("error_events", &params);
        assert_eq!(
            args,
            vec![
                "error_events",
                "--filter_pattern",
                "ERROR",
                "--limit",
                "10",
                "--services",
                "[\"lambda\"]",
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_returns_stdout() {
        let mut params = Parameters::new();
        params.insert("time_range".to_string(), json!("1h"));

        let out = executor("echo", 5_000)
            .execute(&CancellationToken::new(), "recent_events", &params)
            .await
            .unwrap();
        assert_eq!(out.trim(), "recent_events --time_range 1h");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_operation_failure() {
        let err = executor("false", 5_000)
            .execute(&CancellationToken::new(), "findings", &Parameters::new())
            .await
            .unwrap_err();
        match err {
            ExecutorError::OperationFailed { operation, message } => {
                assert_eq!(operation, "findings");
                assert!(message.starts_with("exited with"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        // `sleep 5`: the operation name doubles as the sleep duration.
        let err = executor("sleep", 100)
            .execute(&CancellationToken::new(), "5", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_operation_returns_promptly() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = executor("sleep", 10_000)
            .execute(&cancel, "5", &Parameters::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = executor("/nonexistent/ops-collector", 1_000)
            .execute(&CancellationToken::new(), "services", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_execute_many_runs_every_call() {
        let calls = vec![
            crate::executor::OperationCall::new("first"),
            crate::executor::OperationCall::new("second"),
        ];
        let results = executor("echo", 5_000)
            .execute_many(&CancellationToken::new(), &calls)
            .await;
        let outputs: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().trim().to_string())
            .collect();
        assert_eq!(outputs, vec!["first", "second"]);
    }
}
