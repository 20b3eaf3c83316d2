//! Per-run collector records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::collectors::CollectorCategory;

/// Lifecycle state of a scheduled collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStatus {
    /// Operations in flight
    Running,
    /// Every operation succeeded
    Completed,
    /// An operation failed or was cancelled
    Failed,
    /// Nothing ran: required evidence was missing or the run was interrupted
    Skipped,
}

impl CollectorStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorStatus::Running => "running",
            CollectorStatus::Completed => "completed",
            CollectorStatus::Failed => "failed",
            CollectorStatus::Skipped => "skipped",
        }
    }

    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CollectorStatus::Running)
    }
}

impl std::fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One collector instance within a coordinator run.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledCollector {
    /// `<category>_<uuid>`, unique per run.
    pub id: String,
    /// Category this collector gathers.
    pub category: CollectorCategory,
    /// Current status.
    pub status: CollectorStatus,
    /// When the collector started; `None` for skipped collectors.
    pub start_time: Option<DateTime<Utc>>,
    /// When the collector reached a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    /// Operation names, in execution order.
    pub operations: Vec<String>,
    /// Output per completed operation, keyed by operation name.
    #[serde(skip_serializing)]
    pub results: BTreeMap<String, Value>,
    /// First failure, if any.
    pub error: Option<String>,
    /// Required evidence keys that were absent when the collector was scheduled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_dependencies: Vec<String>,
}

impl ScheduledCollector {
    /// A collector that is about to run the given operations.
    pub fn running(category: CollectorCategory, operations: Vec<String>) -> Self {
        Self {
            id: new_id(category),
            category,
            status: CollectorStatus::Running,
            start_time: Some(Utc::now()),
            end_time: None,
            operations,
            results: BTreeMap::new(),
            error: None,
            missing_dependencies: Vec::new(),
        }
    }

    /// A collector created directly in the `skipped` state.
    pub fn skipped(category: CollectorCategory, missing_dependencies: Vec<String>) -> Self {
        Self {
            id: new_id(category),
            category,
            status: CollectorStatus::Skipped,
            start_time: None,
            end_time: Some(Utc::now()),
            operations: Vec::new(),
            results: BTreeMap::new(),
            error: None,
            missing_dependencies,
        }
    }

    /// A collector whose stage never started because the run was interrupted.
    pub fn not_started(category: CollectorCategory, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::skipped(category, Vec::new())
        }
    }

    /// Move from `running` to `completed`. No-op once terminal.
    pub fn complete(&mut self) {
        self.finish(CollectorStatus::Completed, None);
    }

    /// Move from `running` to `failed`, recording the error. No-op once terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(CollectorStatus::Failed, Some(error.into()));
    }

    /// Milliseconds between start and end, when both are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    fn finish(&mut self, status: CollectorStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error = error;
        self.end_time = Some(Utc::now());
    }
}

fn new_id(category: CollectorCategory) -> String {
    format!("{}_{}", category, Uuid::new_v4().simple())
}
