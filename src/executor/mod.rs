//! Contract with the external operation executor.
//!
//! The orchestrator never talks to cloud APIs itself. Every piece of evidence is
//! gathered by asking an [`OperationExecutor`] to run a named operation with a
//! parameter map and return its textual output. The concrete catalog of
//! operations, credentials and rate limiting all live behind this trait.

mod process;

pub use process::ProcessExecutor;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorResult;

/// Parameter map passed to operations.
///
/// Values use [`serde_json::Value`] so every parameter is one of a closed set of
/// variants (null, bool, number, string, array, object).
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// A single named operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    /// Operation name understood by the executor.
    pub name: String,
    /// Parameters for this invocation.
    #[serde(default)]
    pub parameters: Parameters,
}

impl OperationCall {
    /// Create a call with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// Executes named operations on behalf of evidence collectors.
///
/// Implementations must observe `cancel`: once it fires, in-flight work should
/// stop and return [`ExecutorError::Cancelled`](crate::error::ExecutorError::Cancelled).
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute one operation and return its text output.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        parameters: &Parameters,
    ) -> ExecutorResult<String>;

    /// Execute several operations concurrently.
    ///
    /// Results are returned in the same order as `calls`.
    async fn execute_many(
        &self,
        cancel: &CancellationToken,
        calls: &[OperationCall],
    ) -> Vec<ExecutorResult<String>> {
        let futures = calls
            .iter()
            .map(|call| self.execute(cancel, &call.name, &call.parameters));
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use serde_json::json;

    struct EchoExecutor;

    #[async_trait]
    impl OperationExecutor for EchoExecutor {
        async fn execute(
            &self,
            _cancel: &CancellationToken,
            operation: &str,
            parameters: &Parameters,
        ) -> ExecutorResult<String> {
            if operation == "broken" {
                return Err(ExecutorError::OperationFailed {
                    operation: operation.to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(format!("{}:{}", operation, parameters.len()))
        }
    }

    #[test]
    fn test_operation_call_builder() {
        let call = OperationCall::new("error_events")
            .with_param("filter_pattern", json!("ERROR"))
            .with_param("limit", json!(50));
        assert_eq!(call.name, "error_events");
        assert_eq!(call.parameters.get("limit"), Some(&json!(50)));
    }

    #[tokio::test]
    async fn test_execute_many_preserves_order() {
        let calls = vec![
            OperationCall::new("a").with_param("x", json!(1)),
            OperationCall::new("broken"),
            OperationCall::new("c"),
        ];
        let results = EchoExecutor
            .execute_many(&CancellationToken::new(), &calls)
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), "a:1");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap(), "c:0");
    }
}
