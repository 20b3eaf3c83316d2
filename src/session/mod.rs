//! End-to-end investigation driver.
//!
//! An [`Investigator`] turns a free-text query into an [`InvestigationSession`]:
//!
//! 1. classify the query into an [`Intent`]
//! 2. recall similar past investigations (informational only)
//! 3. evaluate the decision tree
//! 4. run the [`Coordinator`] over the matched nodes, or a bounded fallback
//!    loop when no node asks for a collector
//! 5. write the outcome back to [`InvestigationMemory`]
//!
//! Every step is written to the session's [`ChainOfThought`].

mod chain;

pub use chain::{ChainOfThought, ThoughtStep};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{classify, Intent};
use crate::collectors::{CollectorCategory, OperationsProvider, ERROR_PATTERNS_KEY};
use crate::config::InvestigationConfig;
use crate::coordinator::{
    aggregate, attach_error_patterns, deadline_after, output_value, saturating_millis,
    CollectorStatus, Coordinator, Evidence, ScheduledCollector, METADATA_KEY,
};
use crate::decision::{default_tree, DecisionTree, TreeEvaluation};
use crate::error::{AppResult, InvestigationError};
use crate::executor::{OperationExecutor, Parameters};
use crate::memory::{HealthStatus, InvestigationMemory, InvestigationRecord, SimilarInvestigation};

const FALLBACK_ERROR_KEYWORDS: &[&str] = &["error", "fail", "exception", "crash", "bug", "5xx"];
const FALLBACK_PERFORMANCE_KEYWORDS: &[&str] =
    &["slow", "latency", "performance", "timeout", "cpu", "memory"];

// ============================================================================
// Session
// ============================================================================

/// How an investigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    /// Ran to the end
    Completed,
    /// The deadline cut collection short
    TimedOut,
    /// The caller cancelled
    Cancelled,
}

impl InvestigationStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::Completed => "completed",
            InvestigationStatus::TimedOut => "timed_out",
            InvestigationStatus::Cancelled => "cancelled",
        }
    }

    fn from_interruption(interruption: Option<&InvestigationError>) -> Self {
        match interruption {
            Some(InvestigationError::DeadlineExceeded { .. }) => InvestigationStatus::TimedOut,
            Some(InvestigationError::Cancelled) => InvestigationStatus::Cancelled,
            _ => InvestigationStatus::Completed,
        }
    }
}

impl std::fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything one investigation produced.
#[derive(Debug, Clone, Serialize)]
pub struct InvestigationSession {
    id: String,
    query: String,
    intent: Intent,
    status: InvestigationStatus,
    similar_investigations: Vec<SimilarInvestigation>,
    chain_of_thought: ChainOfThought,
    evidence: Evidence,
    started_at: DateTime<Utc>,
    execution_time_ms: u64,
}

impl InvestigationSession {
    /// Unique session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The query as submitted, trimmed.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Classified intent.
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// How the investigation ended.
    pub fn status(&self) -> InvestigationStatus {
        self.status
    }

    /// Past investigations that looked similar when this one started.
    pub fn similar_investigations(&self) -> &[SimilarInvestigation] {
        &self.similar_investigations
    }

    /// Reasoning log.
    pub fn chain_of_thought(&self) -> &ChainOfThought {
        &self.chain_of_thought
    }

    /// Collected evidence, including `_metadata`.
    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Whether any collector result was gathered.
    pub fn has_evidence(&self) -> bool {
        self.evidence.keys().any(|k| k != METADATA_KEY)
    }

    /// Wall-clock duration in milliseconds.
    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }
}

// ============================================================================
// Investigator
// ============================================================================

/// Runs investigations against an executor and shares memory between them.
#[derive(Clone)]
pub struct Investigator {
    config: InvestigationConfig,
    executor: Arc<dyn OperationExecutor>,
    provider: Arc<dyn OperationsProvider>,
    tree: Arc<DecisionTree>,
    memory: Arc<RwLock<InvestigationMemory>>,
}

/// What a collection phase (coordinator or fallback) produced.
struct Collection {
    evidence: Evidence,
    collectors: Vec<ScheduledCollector>,
    interruption: Option<InvestigationError>,
}

impl Investigator {
    /// Create an investigator using the built-in decision tree.
    pub fn new(
        config: InvestigationConfig,
        executor: Arc<dyn OperationExecutor>,
        provider: Arc<dyn OperationsProvider>,
    ) -> Self {
        let memory = InvestigationMemory::new(config.memory_capacity);
        Self {
            config,
            executor,
            provider,
            tree: Arc::new(default_tree()),
            memory: Arc::new(RwLock::new(memory)),
        }
    }

    /// Use a custom decision tree.
    pub fn with_tree(mut self, tree: DecisionTree) -> Self {
        self.tree = Arc::new(tree);
        self
    }

    /// Share an existing memory.
    pub fn with_memory(mut self, memory: Arc<RwLock<InvestigationMemory>>) -> Self {
        self.memory = memory;
        self
    }

    /// Shared investigation memory.
    pub fn memory(&self) -> Arc<RwLock<InvestigationMemory>> {
        self.memory.clone()
    }

    /// Investigate a query within `deadline`.
    ///
    /// Only a blank query is an error. Timeouts and cancellation end the
    /// session early with [`InvestigationStatus::TimedOut`] or
    /// [`InvestigationStatus::Cancelled`] and whatever evidence was collected.
    pub async fn investigate(
        &self,
        cancel: &CancellationToken,
        query: &str,
        deadline: Duration,
    ) -> AppResult<InvestigationSession> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InvestigationError::EmptyQuery.into());
        }

        let started = Instant::now();
        let started_at = Utc::now();
        let deadline_at = deadline_after(started, deadline);
        let id = Uuid::new_v4().to_string();
        let mut chain = ChainOfThought::new();

        info!(session_id = %id, query = %query, "Starting investigation");

        let intent = classify(query);
        chain.record(
            format!(
                "Query classified as '{}' with confidence {:.2}",
                display_label(&intent.primary),
                intent.confidence
            ),
            "classify_query",
            format!(
                "services: [{}], urgency: {}, time frame: {}, data types: [{}]",
                intent.target_services.join(", "),
                intent.urgency,
                intent.time_frame,
                intent.data_types.join(", ")
            ),
        );

        let similar = self
            .memory
            .read()
            .await
            .find_similar(&intent, self.config.similar_limit);
        if !similar.is_empty() {
            debug!(count = similar.len(), best = similar[0].similarity, "Found similar investigations");
        }
        chain.record(
            "Checking memory for similar investigations",
            "recall_similar",
            match similar.first() {
                Some(best) => format!(
                    "{} similar, best match '{}' ({:.2})",
                    similar.len(),
                    best.record.query,
                    best.similarity
                ),
                None => "no similar investigations".to_string(),
            },
        );

        let evaluation = self.tree.applicable_nodes(query);
        chain.record(
            format!("Decision tree matched {} nodes", evaluation.nodes.len()),
            "evaluate_decision_tree",
            format!("path: {}", evaluation.trace.current_path.join(" -> ")),
        );

        let base = base_parameters(&intent);
        let collection = if evaluation.has_applicable_nodes() {
            self.run_coordinator(cancel, &evaluation, &base, deadline_at, &mut chain)
                .await
        } else {
            chain.record(
                "No decision node asks for a collector",
                "start_fallback",
                format!("up to {} steps", self.config.fallback_max_steps),
            );
            self.run_fallback(cancel, query, &evaluation, &base, deadline_at, &mut chain)
                .await
        };

        let status = InvestigationStatus::from_interruption(collection.interruption.as_ref());
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let session = InvestigationSession {
            id,
            query: query.to_string(),
            intent,
            status,
            similar_investigations: similar,
            chain_of_thought: chain,
            evidence: collection.evidence,
            started_at,
            execution_time_ms,
        };

        self.write_back(&session, &collection.collectors).await;

        info!(
            session_id = %session.id,
            status = %session.status,
            evidence_keys = session.evidence.len(),
            execution_time_ms,
            "Investigation finished"
        );

        Ok(session)
    }

    async fn run_coordinator(
        &self,
        cancel: &CancellationToken,
        evaluation: &TreeEvaluation,
        base: &Parameters,
        deadline_at: Instant,
        chain: &mut ChainOfThought,
    ) -> Collection {
        let categories: Vec<&str> = evaluation.categories().iter().map(|c| c.as_str()).collect();
        chain.record(
            format!("Collecting evidence from {}", categories.join(", ")),
            "run_coordinator",
            "collectors scheduled",
        );

        let coordinator = Coordinator::new(self.executor.clone(), self.provider.clone());
        let remaining = deadline_at.saturating_duration_since(Instant::now());
        let outcome = coordinator.run(cancel, evaluation, base, remaining).await;

        for collector in &outcome.collectors {
            let result = match (&collector.error, collector.missing_dependencies.is_empty()) {
                (Some(error), _) => error.clone(),
                (None, false) => format!("missing {}", collector.missing_dependencies.join(", ")),
                (None, true) => format!("{} results", collector.results.len()),
            };
            chain.record(
                format!("Collector {} {}", collector.category, collector.status),
                format!("collect_{}", collector.category),
                result,
            );
        }
        if let Some(interruption) = &outcome.interruption {
            chain.record(
                "Collection interrupted",
                "aggregate_partial_evidence",
                interruption.to_string(),
            );
        }

        Collection {
            evidence: outcome.evidence,
            collectors: outcome.collectors,
            interruption: outcome.interruption,
        }
    }

    /// Sequential keyword-driven collection used when the tree gives no direction.
    async fn run_fallback(
        &self,
        cancel: &CancellationToken,
        query: &str,
        evaluation: &TreeEvaluation,
        base: &Parameters,
        deadline_at: Instant,
        chain: &mut ChainOfThought,
    ) -> Collection {
        let lowered = query.to_lowercase();
        let child = cancel.child_token();
        let timeout_ms = saturating_millis(deadline_at.saturating_duration_since(Instant::now()));
        let mut collectors: Vec<ScheduledCollector> = Vec::new();
        let mut interruption = None;

        for step in 1..=self.config.fallback_max_steps {
            let tried: Vec<CollectorCategory> = collectors.iter().map(|c| c.category).collect();
            let Some(category) = next_fallback_category(&lowered, &tried) else {
                chain.record(
                    "Every fallback strategy has been tried",
                    "proceed_with_available_information",
                    format!("{} collectors ran", collectors.len()),
                );
                break;
            };

            let calls = self.provider.operations(category, base);
            debug!(step, category = %category, operations = calls.len(), "Fallback step");

            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(InvestigationError::Cancelled),
                _ = tokio::time::sleep_until(deadline_at) => {
                    Err(InvestigationError::DeadlineExceeded { timeout_ms })
                }
                results = self.executor.execute_many(&child, &calls) => Ok(results),
            };
            let results = match waited {
                Ok(results) => results,
                Err(reason) => {
                    warn!(step, reason = %reason, "Fallback interrupted");
                    child.cancel();
                    chain.record(
                        format!("Fallback step {} interrupted", step),
                        format!("collect_{}", category),
                        reason.to_string(),
                    );
                    interruption = Some(reason);
                    break;
                }
            };

            let mut collector =
                ScheduledCollector::running(category, calls.iter().map(|c| c.name.clone()).collect());
            let mut texts = Vec::new();
            for (call, result) in calls.iter().zip(results) {
                match result {
                    Ok(output) => {
                        collector
                            .results
                            .insert(call.name.clone(), output_value(&output));
                        texts.push(output);
                    }
                    Err(e) => {
                        warn!(operation = %call.name, error = %e, "Fallback operation failed");
                        collector.fail(e.to_string());
                    }
                }
            }
            attach_error_patterns(&mut collector, &texts);
            collector.complete();

            let step_complete =
                collector.status == CollectorStatus::Completed && !collector.results.is_empty();
            chain.record(
                format!("Fallback step {} chose {}", step, category),
                format!("collect_{}", category),
                match &collector.error {
                    Some(error) => error.clone(),
                    None => format!("{} results", collector.results.len()),
                },
            );
            collectors.push(collector);

            if step_complete {
                break;
            }
        }

        let evidence = aggregate(&collectors, &evaluation.trace, interruption.as_ref());
        Collection {
            evidence,
            collectors,
            interruption,
        }
    }

    async fn write_back(&self, session: &InvestigationSession, collectors: &[ScheduledCollector]) {
        let completed = collectors
            .iter()
            .filter(|c| c.status == CollectorStatus::Completed)
            .count();
        let failed = collectors
            .iter()
            .filter(|c| c.status == CollectorStatus::Failed)
            .count();
        let skipped = collectors
            .iter()
            .filter(|c| c.status == CollectorStatus::Skipped)
            .count();
        let has_evidence = session.has_evidence();

        let health = if failed > 0 || logged_error_count(&session.evidence) > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let mut memory = self.memory.write().await;

        memory.record_outcome(InvestigationRecord {
            query: session.query.clone(),
            timestamp: Utc::now(),
            intent: session.intent.clone(),
            result_summary: format!(
                "{}: {} completed, {} failed, {} skipped",
                session.status, completed, failed, skipped
            ),
            execution_time_ms: session.execution_time_ms,
            success: has_evidence && session.status == InvestigationStatus::Completed,
        });

        // Nothing gathered says nothing about health; keep what is known.
        if has_evidence {
            for service in &session.intent.target_services {
                memory.update_service_health(service, health);
            }
        } else if !session.intent.target_services.is_empty() {
            debug!(session_id = %session.id, "No evidence, service health left unchanged");
        }

        if has_evidence && session.intent.confidence > self.config.pattern_confidence_threshold {
            let name = pattern_name(&session.intent);
            let conditions: Vec<String> = collectors
                .iter()
                .filter(|c| !c.results.is_empty())
                .map(|c| c.category.to_string())
                .collect();
            let frequency = memory.reinforce_pattern(
                &name,
                &format!(
                    "{} investigation of {}",
                    display_label(&session.intent.primary),
                    if session.intent.target_services.is_empty() {
                        "unspecified services".to_string()
                    } else {
                        session.intent.target_services.join(", ")
                    }
                ),
                conditions,
            );
            debug!(pattern = %name, frequency, "Reinforced pattern");
        }
    }
}

/// Session-level parameters placed underneath every node's parameters.
fn base_parameters(intent: &Intent) -> Parameters {
    let mut params = Parameters::new();
    if !intent.target_services.is_empty() {
        params.insert("target_services".to_string(), json!(intent.target_services));
    }
    params.insert("time_frame".to_string(), json!(intent.time_frame.as_str()));
    params.insert("urgency".to_string(), json!(intent.urgency.as_str()));
    params
}

/// Next fallback category: logs for error-like queries, metrics for
/// performance-like ones, infrastructure otherwise. Already tried categories
/// are skipped.
fn next_fallback_category(
    lowered_query: &str,
    tried: &[CollectorCategory],
) -> Option<CollectorCategory> {
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lowered_query.contains(k));

    let mut candidates = Vec::new();
    if mentions(FALLBACK_ERROR_KEYWORDS) {
        candidates.push(CollectorCategory::Log);
    }
    if mentions(FALLBACK_PERFORMANCE_KEYWORDS) {
        candidates.push(CollectorCategory::Metrics);
    }
    candidates.push(CollectorCategory::Infrastructure);

    candidates.into_iter().find(|c| !tried.contains(c))
}

/// `<primary>_<sorted services>`.
fn pattern_name(intent: &Intent) -> String {
    let mut services = intent.target_services.clone();
    services.sort();
    format!("{}_{}", display_label(&intent.primary), services.join("_"))
}

fn display_label(primary: &str) -> &str {
    if primary.is_empty() {
        "general"
    } else {
        primary
    }
}

fn logged_error_count(evidence: &Evidence) -> u64 {
    evidence
        .get(&CollectorCategory::Log.evidence_key(ERROR_PATTERNS_KEY))
        .and_then(|v| v.get("total_errors"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}
