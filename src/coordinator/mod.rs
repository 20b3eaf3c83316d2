//! Dependency-staged parallel execution of evidence collectors.
//!
//! The coordinator takes the nodes matched by the decision tree, turns their
//! categories into collectors, and runs them stage by stage:
//!
//! - stages follow [`DependencySpec::execution_order`](crate::collectors::DependencySpec)
//! - collectors within a stage run as independent tokio tasks
//! - a collector whose required evidence is missing is recorded as skipped
//! - finished collectors publish their results to a shared store that later
//!   stages consult for dependency checks
//!
//! An overall deadline and the caller's cancellation token bound the run. When
//! either fires, in-flight operations are cancelled, the tasks are joined, and
//! whatever was collected is still aggregated. Categories of stages that never
//! started are recorded as skipped with a `not started: ...` reason.

mod collector;

pub use collector::{CollectorStatus, ScheduledCollector};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collectors::{
    analyze_error_patterns, CollectorCategory, OperationsProvider, ERROR_PATTERNS_KEY,
};
use crate::decision::{DecisionTrace, TreeEvaluation};
use crate::error::{ExecutorError, InvestigationError};
use crate::executor::{OperationCall, OperationExecutor, Parameters};

/// Evidence key holding run metadata.
pub const METADATA_KEY: &str = "_metadata";

/// Evidence bundle keyed by result name.
pub type Evidence = BTreeMap<String, Value>;

type SharedStore = Arc<Mutex<Evidence>>;

/// Horizon used when a timeout does not fit in an [`Instant`].
const UNBOUNDED_HORIZON: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + UNBOUNDED_HORIZON)
}

/// Milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one coordinator run.
#[derive(Debug, Clone)]
pub struct CoordinatorOutcome {
    /// Aggregated evidence including [`METADATA_KEY`].
    pub evidence: Evidence,
    /// Every collector of the run, in scheduling order.
    pub collectors: Vec<ScheduledCollector>,
    /// Set when the deadline or the caller's cancellation cut the run short.
    pub interruption: Option<InvestigationError>,
}

impl CoordinatorOutcome {
    /// Whether any collector produced a result.
    pub fn has_evidence(&self) -> bool {
        self.evidence.keys().any(|k| k != METADATA_KEY)
    }

    /// Number of collectors with the given status.
    pub fn count(&self, status: CollectorStatus) -> usize {
        self.collectors.iter().filter(|c| c.status == status).count()
    }

    /// Whether the run hit its deadline.
    pub fn timed_out(&self) -> bool {
        matches!(
            self.interruption,
            Some(InvestigationError::DeadlineExceeded { .. })
        )
    }

    /// Whether the caller cancelled the run.
    pub fn cancelled(&self) -> bool {
        matches!(self.interruption, Some(InvestigationError::Cancelled))
    }
}

// ============================================================================
// Planning
// ============================================================================

/// A category chosen for the run, with its effective parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCollector {
    /// Category to collect.
    pub category: CollectorCategory,
    /// Base parameters overlaid with the winning node's parameters.
    pub parameters: Parameters,
}

/// Distinct categories of the matched nodes, in first-seen order.
///
/// When several nodes ask for the same category, the parameters of the
/// highest-priority node win; the first node wins a tie. `base` sits underneath
/// the node parameters.
pub fn plan_collectors(evaluation: &TreeEvaluation, base: &Parameters) -> Vec<PlannedCollector> {
    let mut order: Vec<CollectorCategory> = Vec::new();
    let mut chosen: HashMap<CollectorCategory, (u8, &Parameters)> = HashMap::new();

    for node in &evaluation.nodes {
        for category in &node.collector_categories {
            match chosen.get(category).map(|(priority, _)| *priority) {
                Some(priority) if priority >= node.priority => {}
                Some(_) => {
                    chosen.insert(*category, (node.priority, &node.parameters));
                }
                None => {
                    order.push(*category);
                    chosen.insert(*category, (node.priority, &node.parameters));
                }
            }
        }
    }

    order
        .into_iter()
        .map(|category| {
            let mut parameters = base.clone();
            if let Some((_, node_params)) = chosen.get(&category) {
                for (key, value) in node_params.iter() {
                    parameters.insert(key.clone(), value.clone());
                }
            }
            PlannedCollector {
                category,
                parameters,
            }
        })
        .collect()
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs collectors in dependency stages against an executor.
#[derive(Clone)]
pub struct Coordinator {
    executor: Arc<dyn OperationExecutor>,
    provider: Arc<dyn OperationsProvider>,
}

impl Coordinator {
    /// Create a coordinator.
    pub fn new(executor: Arc<dyn OperationExecutor>, provider: Arc<dyn OperationsProvider>) -> Self {
        Self { executor, provider }
    }

    /// Run every collector the evaluation asks for.
    ///
    /// Never fails: operation errors stay local to their collector, and an
    /// expired deadline or a cancelled token is reported through
    /// [`CoordinatorOutcome::interruption`].
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        evaluation: &TreeEvaluation,
        base_parameters: &Parameters,
        timeout: Duration,
    ) -> CoordinatorOutcome {
        let deadline = deadline_after(Instant::now(), timeout);
        let timeout_ms = saturating_millis(timeout);
        let child = cancel.child_token();
        let store: SharedStore = Arc::new(Mutex::new(Evidence::new()));

        let mut stages: BTreeMap<u32, Vec<PlannedCollector>> = BTreeMap::new();
        for planned in plan_collectors(evaluation, base_parameters) {
            stages
                .entry(planned.category.spec().execution_order)
                .or_default()
                .push(planned);
        }

        let mut collectors = Vec::new();
        let mut interruption = None;

        for (stage, planned) in stages {
            if interruption.is_none() {
                if cancel.is_cancelled() {
                    interruption = Some(InvestigationError::Cancelled);
                } else if Instant::now() >= deadline {
                    interruption = Some(InvestigationError::DeadlineExceeded { timeout_ms });
                }
            }
            if let Some(reason) = &interruption {
                debug!(stage, remaining = planned.len(), "Stage not started");
                let why = not_started_reason(reason);
                collectors.extend(
                    planned
                        .into_iter()
                        .map(|p| ScheduledCollector::not_started(p.category, why)),
                );
                continue;
            }

            info!(
                stage,
                categories = ?planned.iter().map(|p| p.category.as_str()).collect::<Vec<_>>(),
                "Starting collector stage"
            );

            let mut categories = Vec::new();
            let mut handles: Vec<JoinHandle<ScheduledCollector>> = Vec::new();
            // Every collector of the stage is checked against the same view.
            let available: HashSet<String> = store.lock().await.keys().cloned().collect();

            for PlannedCollector {
                category,
                parameters,
            } in planned
            {
                let spec = category.spec();
                let missing = spec.missing_dependencies(|key| available.contains(key));
                if !missing.is_empty() {
                    warn!(category = %category, missing = ?missing, "Skipping collector, dependencies unmet");
                    collectors.push(ScheduledCollector::skipped(category, missing));
                    continue;
                }

                debug!(
                    category = %category,
                    wait_timeout_ms = spec.wait_timeout.as_millis() as u64,
                    "Spawning collector"
                );
                let calls = self.provider.operations(category, &parameters);
                categories.push(category);
                handles.push(tokio::spawn(run_collector(
                    self.executor.clone(),
                    child.clone(),
                    category,
                    calls,
                    store.clone(),
                )));
            }

            let mut joined = Box::pin(join_all(handles));
            let waited = tokio::select! {
                biased;
                results = &mut joined => Ok(results),
                _ = cancel.cancelled() => Err(InvestigationError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    Err(InvestigationError::DeadlineExceeded { timeout_ms })
                }
            };
            let results = match waited {
                Ok(results) => results,
                Err(reason) => {
                    warn!(stage, reason = %reason, "Run interrupted, cancelling collectors");
                    interruption = Some(reason);
                    child.cancel();
                    joined.await
                }
            };

            for (category, result) in categories.into_iter().zip(results) {
                match result {
                    Ok(collector) => collectors.push(collector),
                    Err(e) => {
                        let mut collector = ScheduledCollector::running(category, Vec::new());
                        collector.fail(format!("collector task failed: {}", e));
                        collectors.push(collector);
                    }
                }
            }
        }

        let evidence = aggregate(&collectors, &evaluation.trace, interruption.as_ref());

        info!(
            total = collectors.len(),
            completed = collectors.iter().filter(|c| c.status == CollectorStatus::Completed).count(),
            failed = collectors.iter().filter(|c| c.status == CollectorStatus::Failed).count(),
            skipped = collectors.iter().filter(|c| c.status == CollectorStatus::Skipped).count(),
            interrupted = interruption.is_some(),
            "Coordinator run finished"
        );

        CoordinatorOutcome {
            evidence,
            collectors,
            interruption,
        }
    }
}

fn not_started_reason(interruption: &InvestigationError) -> &'static str {
    match interruption {
        InvestigationError::Cancelled => "not started: cancelled",
        _ => "not started: deadline exceeded",
    }
}

async fn run_collector(
    executor: Arc<dyn OperationExecutor>,
    cancel: CancellationToken,
    category: CollectorCategory,
    calls: Vec<OperationCall>,
    store: SharedStore,
) -> ScheduledCollector {
    let mut collector =
        ScheduledCollector::running(category, calls.iter().map(|c| c.name.clone()).collect());
    let mut texts = Vec::new();

    for call in &calls {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled {
                operation: call.name.clone(),
            }),
            result = executor.execute(&cancel, &call.name, &call.parameters) => result,
        };

        match result {
            Ok(output) => {
                collector
                    .results
                    .insert(call.name.clone(), output_value(&output));
                texts.push(output);
            }
            Err(e) => {
                warn!(collector = %collector.id, operation = %call.name, error = %e, "Collector operation failed");
                collector.fail(e.to_string());
                break;
            }
        }
    }

    attach_error_patterns(&mut collector, &texts);
    collector.complete();
    publish(&collector, &store).await;

    debug!(
        collector = %collector.id,
        status = %collector.status,
        results = collector.results.len(),
        "Collector finished"
    );
    collector
}

/// Publish a collector's results under `<category>_<result>`, restricted to the
/// keys its category declares.
async fn publish(collector: &ScheduledCollector, store: &SharedStore) {
    let spec = collector.category.spec();
    let mut store = store.lock().await;
    for (name, value) in &collector.results {
        let key = collector.category.evidence_key(name);
        if spec.provides(&key) {
            store.insert(key, value.clone());
        }
    }
}

/// Add the derived error-pattern summary to a log collector's results.
pub(crate) fn attach_error_patterns(collector: &mut ScheduledCollector, texts: &[String]) {
    if collector.category != CollectorCategory::Log || texts.is_empty() {
        return;
    }
    let summary = analyze_error_patterns(texts.iter().map(String::as_str));
    match serde_json::to_value(&summary) {
        Ok(value) => {
            collector
                .results
                .insert(ERROR_PATTERNS_KEY.to_string(), value);
        }
        Err(e) => warn!(error = %e, "Failed to encode error pattern summary"),
    }
}

/// JSON outputs are kept structured; anything else is kept as text.
pub(crate) fn output_value(output: &str) -> Value {
    match serde_json::from_str::<Value>(output) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(output.to_string()),
    }
}

/// Build the evidence bundle: grouped and flattened results plus run metadata.
pub(crate) fn aggregate(
    collectors: &[ScheduledCollector],
    trace: &DecisionTrace,
    interruption: Option<&InvestigationError>,
) -> Evidence {
    let mut evidence = Evidence::new();

    for collector in collectors {
        if collector.results.is_empty() {
            continue;
        }
        let grouped: serde_json::Map<String, Value> = collector
            .results
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        evidence.insert(collector.category.as_str().to_string(), Value::Object(grouped));
        for (name, value) in &collector.results {
            evidence.insert(collector.category.evidence_key(name), value.clone());
        }
    }

    let count = |status: CollectorStatus| collectors.iter().filter(|c| c.status == status).count();
    let timed_out = matches!(
        interruption,
        Some(InvestigationError::DeadlineExceeded { .. })
    );
    let cancelled = matches!(interruption, Some(InvestigationError::Cancelled));
    let records: Vec<Value> = collectors
        .iter()
        .map(|c| {
            let mut record = json!(c);
            record["duration_ms"] = json!(c.duration_ms());
            record
        })
        .collect();

    evidence.insert(
        METADATA_KEY.to_string(),
        json!({
            "total_agents": collectors.len(),
            "completed_count": count(CollectorStatus::Completed),
            "failed_count": count(CollectorStatus::Failed),
            "skipped_count": count(CollectorStatus::Skipped),
            "collectors": records,
            "decision_path": trace.current_path,
            "decisions_applied": trace.decisions_applied,
            "timed_out": timed_out,
            "cancelled": cancelled,
            "completed_at": Utc::now().to_rfc3339(),
        }),
    );

    evidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionNode;

    fn evaluation(nodes: Vec<DecisionNode>) -> TreeEvaluation {
        TreeEvaluation {
            nodes,
            trace: DecisionTrace::default(),
        }
    }

    #[test]
    fn test_plan_keeps_highest_priority_parameters() {
        let nodes = vec![
            DecisionNode::new("a", "A")
                .with_priority(8)
                .collects(vec![CollectorCategory::Log])
                .with_param("time_range", json!("1h")),
            DecisionNode::new("b", "B")
                .with_priority(10)
                .collects(vec![CollectorCategory::Log, CollectorCategory::Infrastructure])
                .with_param("time_range", json!("15m")),
            DecisionNode::new("c", "C")
                .with_priority(10)
                .collects(vec![CollectorCategory::Log])
                .with_param("time_range", json!("5m")),
        ];
        let mut base = Parameters::new();
        base.insert("time_range".to_string(), json!("24h"));
        base.insert("urgency".to_string(), json!("high"));

        let plan = plan_collectors(&evaluation(nodes), &base);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].category, CollectorCategory::Log);
        assert_eq!(plan[0].parameters["time_range"], json!("15m"));
        assert_eq!(plan[0].parameters["urgency"], json!("high"));
        assert_eq!(plan[1].category, CollectorCategory::Infrastructure);
    }

    #[test]
    fn test_plan_ignores_nodes_without_categories() {
        let plan = plan_collectors(
            &evaluation(vec![DecisionNode::new("root", "Root")]),
            &Parameters::new(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_deadline_after_clamps_huge_timeouts() {
        let start = Instant::now();
        assert_eq!(
            deadline_after(start, Duration::from_secs(2)),
            start + Duration::from_secs(2)
        );
        assert_eq!(
            deadline_after(start, Duration::MAX),
            start + UNBOUNDED_HORIZON
        );
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::from_millis(200)), 200);
    }

    #[test]
    fn test_not_started_reason_names_interruption() {
        assert_eq!(
            not_started_reason(&InvestigationError::Cancelled),
            "not started: cancelled"
        );
        assert_eq!(
            not_started_reason(&InvestigationError::DeadlineExceeded { timeout_ms: 10 }),
            "not started: deadline exceeded"
        );
    }

    #[test]
    fn test_output_value() {
        assert_eq!(output_value("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(output_value("[1,2]"), json!([1, 2]));
        assert_eq!(output_value("42"), json!("42"));
        assert_eq!(output_value("ERROR boom"), json!("ERROR boom"));
    }

    #[test]
    fn test_aggregate_flattens_and_counts() {
        let mut done = ScheduledCollector::running(
            CollectorCategory::Infrastructure,
            vec!["services".to_string()],
        );
        done.results
            .insert("services".to_string(), json!(["lambda"]));
        done.complete();
        let skipped = ScheduledCollector::skipped(
            CollectorCategory::Cost,
            vec!["infrastructure_services".to_string()],
        );

        let trace = DecisionTrace {
            current_path: vec!["root".to_string()],
            decisions_applied: vec!["Root: route".to_string()],
        };
        let evidence = aggregate(&[done, skipped], &trace, None);

        assert_eq!(evidence["infrastructure"], json!({"services": ["lambda"]}));
        assert_eq!(evidence["infrastructure_services"], json!(["lambda"]));
        let meta = &evidence[METADATA_KEY];
        assert_eq!(meta["total_agents"], 2);
        assert_eq!(meta["completed_count"], 1);
        assert_eq!(meta["skipped_count"], 1);
        assert_eq!(meta["timed_out"], false);
        assert_eq!(meta["decision_path"], json!(["root"]));
        assert_eq!(
            meta["collectors"][1]["missing_dependencies"],
            json!(["infrastructure_services"])
        );
    }
}
