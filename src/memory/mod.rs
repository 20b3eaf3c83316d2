//! Bounded recall of past investigations.
//!
//! [`InvestigationMemory`] keeps the last N investigation outcomes in a FIFO
//! ring, a table of learned patterns reinforced whenever a similar
//! investigation succeeds, and the latest known health per service. Nothing is
//! persisted: memory lives as long as the process.
//!
//! Similar-investigation recall is informational only and never changes how a
//! query is routed.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::Intent;

const SIMILARITY_THRESHOLD: f64 = 0.5;
const DEFAULT_PATTERN_ACCURACY: f64 = 0.5;

// ============================================================================
// Records
// ============================================================================

/// Outcome of one finished investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    /// Original query text.
    pub query: String,
    /// When the investigation finished.
    pub timestamp: DateTime<Utc>,
    /// Classified intent.
    pub intent: Intent,
    /// Short summary of what was collected.
    pub result_summary: String,
    /// Wall-clock duration in milliseconds.
    pub execution_time_ms: u64,
    /// Whether any evidence was collected without interruption.
    pub success: bool,
}

/// A recurring investigation shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Derived name, unique within the memory.
    pub name: String,
    /// Description from the first occurrence.
    pub description: String,
    /// Conditions under which the pattern was observed.
    pub conditions: Vec<String>,
    /// How many times the pattern was reinforced.
    pub frequency: u32,
    /// Estimated accuracy, starts at a neutral 0.5.
    pub accuracy: f64,
    /// First time the pattern was seen.
    pub first_seen: DateTime<Utc>,
    /// Most recent reinforcement.
    pub last_seen: DateTime<Utc>,
}

/// Last observed health of a service. A service with no entry was never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Checked and no errors seen
    Healthy,
    /// Errors observed in collected evidence
    Degraded,
}

impl HealthStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health entry for one service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Status as of `updated_at`.
    pub status: HealthStatus,
    /// When the status was written.
    pub updated_at: DateTime<Utc>,
}

/// A stored investigation together with its similarity to a new intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarInvestigation {
    /// Stored record.
    pub record: InvestigationRecord,
    /// Similarity score (0.0-1.0).
    pub similarity: f64,
}

// ============================================================================
// Memory
// ============================================================================

/// Fixed-capacity investigation memory.
#[derive(Debug, Clone)]
pub struct InvestigationMemory {
    capacity: usize,
    records: VecDeque<InvestigationRecord>,
    learned_patterns: Vec<LearnedPattern>,
    service_health: HashMap<String, ServiceHealth>,
}

impl InvestigationMemory {
    /// Create a memory holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
            learned_patterns: Vec::new(),
            service_health: HashMap::new(),
        }
    }

    /// Maximum number of records kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &InvestigationRecord> {
        self.records.iter()
    }

    /// Append a record, evicting the oldest when full.
    pub fn record_outcome(&mut self, record: InvestigationRecord) {
        if self.records.len() == self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                debug!(query = %evicted.query, "Evicted oldest investigation record");
            }
        }
        self.records.push_back(record);
    }

    /// Stored investigations with similarity above 0.5, best first, at most `limit`.
    pub fn find_similar(&self, intent: &Intent, limit: usize) -> Vec<SimilarInvestigation> {
        let mut similar: Vec<SimilarInvestigation> = self
            .records
            .iter()
            .map(|record| SimilarInvestigation {
                similarity: similarity(intent, &record.intent),
                record: record.clone(),
            })
            .filter(|s| s.similarity > SIMILARITY_THRESHOLD)
            .collect();

        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar.truncate(limit);
        similar
    }

    /// Reinforce a named pattern, creating it on first sight.
    ///
    /// Returns the pattern's frequency after the update.
    pub fn reinforce_pattern(
        &mut self,
        name: &str,
        description: &str,
        conditions: Vec<String>,
    ) -> u32 {
        let now = Utc::now();
        if let Some(pattern) = self.learned_patterns.iter_mut().find(|p| p.name == name) {
            pattern.frequency += 1;
            pattern.last_seen = now;
            return pattern.frequency;
        }

        self.learned_patterns.push(LearnedPattern {
            name: name.to_string(),
            description: description.to_string(),
            conditions,
            frequency: 1,
            accuracy: DEFAULT_PATTERN_ACCURACY,
            first_seen: now,
            last_seen: now,
        });
        1
    }

    /// All learned patterns in creation order.
    pub fn patterns(&self) -> &[LearnedPattern] {
        &self.learned_patterns
    }

    /// Look up a pattern by name.
    pub fn pattern(&self, name: &str) -> Option<&LearnedPattern> {
        self.learned_patterns.iter().find(|p| p.name == name)
    }

    /// Record the latest health of a service, replacing any previous entry.
    pub fn update_service_health(&mut self, service: &str, status: HealthStatus) {
        self.service_health.insert(
            service.to_string(),
            ServiceHealth {
                status,
                updated_at: Utc::now(),
            },
        );
    }

    /// Latest known health of a service.
    pub fn service_health(&self, service: &str) -> Option<ServiceHealth> {
        self.service_health.get(service).copied()
    }
}

impl Default for InvestigationMemory {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Weighted similarity between two intents.
///
/// `0.4` for a matching primary label, `0.3` scaled by the share of `new`'s
/// target services also present in `stored`, `0.2` scaled by urgency
/// closeness, and `0.1` for a matching time frame.
pub fn similarity(new: &Intent, stored: &Intent) -> f64 {
    let mut score = 0.0;

    if new.primary == stored.primary {
        score += 0.4;
    }

    if !new.target_services.is_empty() {
        let overlap = new
            .target_services
            .iter()
            .filter(|s| stored.targets(s))
            .count();
        score += 0.3 * (overlap as f64 / new.target_services.len() as f64);
    }

    let urgency_gap = (new.urgency.rank() as f64 - stored.urgency.rank() as f64).abs();
    score += 0.2 * (1.0 - urgency_gap / 3.0);

    if new.time_frame == stored.time_frame {
        score += 0.1;
    }

    score
}
