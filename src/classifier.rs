//! Query intent classification.
//!
//! Scores a free-form operational query ("why is chat erroring?") against fixed
//! keyword tables to produce an [`Intent`]: what the operator is trying to do,
//! how urgent it is, which time window matters, which services are involved
//! and which kinds of data are likely to be useful.
//!
//! Classification is pure and total: every input, including the empty string,
//! yields a best-effort [`Intent`].

use serde::{Deserialize, Serialize};

// ============================================================================
// Intent Types
// ============================================================================

/// Primary intent labels, in tie-break priority order.
pub const INTENT_PRIORITY: [&str; 5] = ["troubleshoot", "monitor", "analyze", "optimize", "audit"];

/// How urgently the query needs an answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Routine question
    Low,
    /// Worth looking at soon
    Medium,
    /// Degradation in progress
    High,
    /// Outage-level
    Critical,
}

impl Urgency {
    /// Map a summed urgency score onto a level.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 1.0 => Urgency::Critical,
            s if s >= 0.7 => Urgency::High,
            s if s >= 0.3 => Urgency::Medium,
            _ => Urgency::Low,
        }
    }

    /// Ordinal rank, low = 1 through critical = 4.
    pub fn rank(&self) -> u8 {
        match self {
            Urgency::Low => 1,
            Urgency::Medium => 2,
            Urgency::High => 3,
            Urgency::Critical => 4,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Time window the query is concerned with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeFrame {
    /// Happening right now
    RealTime,
    /// The last few hours
    Recent,
    /// Days or longer
    Historical,
}

impl TimeFrame {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFrame::RealTime => "real_time",
            TimeFrame::Recent => "recent",
            TimeFrame::Historical => "historical",
        }
    }
}

impl std::fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured classification of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Highest-scoring intent label, empty when nothing matched.
    pub primary: String,
    /// Other labels with a positive score, best first.
    pub secondary: Vec<String>,
    /// Confidence in the primary label (0.0-1.0).
    pub confidence: f64,
    /// Services mentioned by the query, sorted and deduplicated.
    pub target_services: Vec<String>,
    /// Urgency level.
    pub urgency: Urgency,
    /// Time window of interest.
    pub time_frame: TimeFrame,
    /// Kinds of data likely to help, in query order.
    pub data_types: Vec<String>,
}

impl Intent {
    /// Whether the query mentions the given service.
    pub fn targets(&self, service: &str) -> bool {
        self.target_services.iter().any(|s| s == service)
    }
}

// ============================================================================
// Keyword Tables
// ============================================================================

const INTENT_KEYWORDS: &[(&str, &[(&str, f64)])] = &[
    (
        "troubleshoot",
        &[
            ("error", 1.0),
            ("errors", 1.0),
            ("erroring", 1.0),
            ("crash", 1.0),
            ("crashing", 1.0),
            ("exception", 0.9),
            ("exceptions", 0.9),
            ("fail", 0.9),
            ("failing", 0.9),
            ("failed", 0.9),
            ("failure", 0.9),
            ("broken", 0.9),
            ("throwing", 0.8),
            ("down", 0.8),
            ("debug", 0.8),
            ("timeout", 0.8),
            ("issue", 0.7),
            ("problem", 0.7),
            ("fix", 0.7),
            ("why", 0.6),
        ],
    ),
    (
        "monitor",
        &[
            ("monitor", 1.0),
            ("status", 0.9),
            ("health", 0.9),
            ("healthy", 0.9),
            ("uptime", 0.9),
            ("watch", 0.8),
            ("check", 0.7),
            ("alive", 0.7),
            ("running", 0.6),
            ("up", 0.4),
        ],
    ),
    (
        "analyze",
        &[
            ("analyze", 1.0),
            ("analysis", 1.0),
            ("trend", 0.9),
            ("trends", 0.9),
            ("pattern", 0.8),
            ("patterns", 0.8),
            ("compare", 0.8),
            ("history", 0.7),
            ("report", 0.7),
            ("usage", 0.6),
        ],
    ),
    (
        "optimize",
        &[
            ("performance", 1.0),
            ("optimize", 1.0),
            ("slow", 0.9),
            ("latency", 0.9),
            ("cost", 0.8),
            ("expensive", 0.8),
            ("faster", 0.8),
            ("improve", 0.7),
            ("throttling", 0.7),
        ],
    ),
    (
        "audit",
        &[
            ("security", 1.0),
            ("audit", 1.0),
            ("breach", 1.0),
            ("unauthorized", 0.9),
            ("compliance", 0.9),
            ("suspicious", 0.9),
            ("permission", 0.8),
            ("permissions", 0.8),
            ("access", 0.6),
        ],
    ),
];

const SERVICE_KEYWORDS: &[(&str, &[&str])] = &[
    ("api_gateway", &["api gateway", "apigateway", "endpoint"]),
    ("bedrock", &["bedrock", "llm", "chat", "model"]),
    ("cloudfront", &["cloudfront", "cdn"]),
    ("dynamodb", &["dynamodb", "dynamo"]),
    ("ec2", &["ec2", "instance"]),
    ("ecs", &["ecs", "container", "fargate"]),
    ("lambda", &["lambda", "function"]),
    ("rds", &["rds", "database", "postgres", "mysql"]),
    ("s3", &["s3", "bucket"]),
    ("sqs", &["sqs", "queue"]),
];

const URGENCY_KEYWORDS: &[(&str, f64)] = &[
    ("critical", 1.0),
    ("urgent", 1.0),
    ("emergency", 1.0),
    ("outage", 1.0),
    ("asap", 0.8),
    ("immediately", 0.8),
    ("down", 0.7),
    ("production", 0.5),
    ("prod", 0.5),
    ("broken", 0.5),
    ("now", 0.4),
    ("failing", 0.4),
    ("error", 0.3),
    ("errors", 0.3),
    ("erroring", 0.3),
    ("slow", 0.2),
];

const TIME_FRAME_KEYWORDS: &[(&str, TimeFrame)] = &[
    ("now", TimeFrame::RealTime),
    ("currently", TimeFrame::RealTime),
    ("current", TimeFrame::RealTime),
    ("live", TimeFrame::RealTime),
    ("recent", TimeFrame::Recent),
    ("recently", TimeFrame::Recent),
    ("today", TimeFrame::Recent),
    ("latest", TimeFrame::Recent),
    ("yesterday", TimeFrame::Historical),
    ("week", TimeFrame::Historical),
    ("month", TimeFrame::Historical),
    ("history", TimeFrame::Historical),
    ("historical", TimeFrame::Historical),
    ("trend", TimeFrame::Historical),
    ("trends", TimeFrame::Historical),
];

const DATA_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("log", "logs"),
    ("logs", "logs"),
    ("error", "logs"),
    ("errors", "logs"),
    ("erroring", "logs"),
    ("exception", "logs"),
    ("throwing", "logs"),
    ("metric", "metrics"),
    ("metrics", "metrics"),
    ("cpu", "metrics"),
    ("memory", "metrics"),
    ("latency", "metrics"),
    ("slow", "metrics"),
    ("status", "status"),
    ("health", "status"),
    ("down", "status"),
    ("cost", "cost"),
    ("bill", "cost"),
    ("spend", "cost"),
    ("security", "security"),
    ("unauthorized", "security"),
    ("permission", "security"),
    ("config", "configuration"),
    ("configuration", "configuration"),
];

// ============================================================================
// Classifier
// ============================================================================

/// Classify a query into an [`Intent`].
pub fn classify(query: &str) -> Intent {
    let lowered = query.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();

    let (primary, secondary, confidence) = score_intents(&tokens);

    let target_services = SERVICE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(service, _)| service.to_string())
        .collect();

    let urgency_score: f64 = tokens.iter().map(|t| lookup(URGENCY_KEYWORDS, t)).sum();

    let time_frame = tokens
        .iter()
        .find_map(|t| {
            TIME_FRAME_KEYWORDS
                .iter()
                .find(|(k, _)| k == t)
                .map(|(_, frame)| *frame)
        })
        .unwrap_or(TimeFrame::Recent);

    let mut data_types: Vec<String> = Vec::new();
    for token in &tokens {
        if let Some((_, kind)) = DATA_TYPE_KEYWORDS.iter().find(|(k, _)| k == token) {
            if !data_types.iter().any(|d| d == kind) {
                data_types.push(kind.to_string());
            }
        }
    }
    if data_types.is_empty() {
        data_types = default_data_types(&primary)
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    Intent {
        primary,
        secondary,
        confidence,
        target_services,
        urgency: Urgency::from_score(urgency_score),
        time_frame,
        data_types,
    }
}

fn lookup(table: &[(&str, f64)], token: &str) -> f64 {
    table
        .iter()
        .find(|(k, _)| *k == token)
        .map(|(_, w)| *w)
        .unwrap_or(0.0)
}

/// Returns (primary, secondary, confidence).
fn score_intents(tokens: &[&str]) -> (String, Vec<String>, f64) {
    if tokens.is_empty() {
        return (String::new(), Vec::new(), 0.0);
    }

    // INTENT_KEYWORDS is declared in INTENT_PRIORITY order, so a stable sort
    // keeps the priority order among equal scores.
    let mut scores: Vec<(&str, f64)> = INTENT_KEYWORDS
        .iter()
        .map(|(label, keywords)| (*label, tokens.iter().map(|t| lookup(keywords, t)).sum()))
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best_label, best_score) = scores[0];
    if best_score <= 0.0 {
        return (String::new(), Vec::new(), 0.0);
    }

    let secondary = scores[1..]
        .iter()
        .filter(|(_, score)| *score > 0.0)
        .map(|(label, _)| label.to_string())
        .collect();
    let confidence = (best_score / tokens.len() as f64).min(1.0);

    (best_label.to_string(), secondary, confidence)
}

fn default_data_types(primary: &str) -> &'static [&'static str] {
    match primary {
        "troubleshoot" => &["logs", "metrics", "status"],
        "monitor" => &["metrics", "status"],
        "analyze" => &["logs", "metrics"],
        _ => &["status"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_table_follows_priority_order() {
        let labels: Vec<&str> = INTENT_KEYWORDS.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, INTENT_PRIORITY);
    }

    #[test]
    fn test_empty_query() {
        let intent = classify("");
        assert_eq!(intent.primary, "");
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.secondary.is_empty());
        assert!(intent.target_services.is_empty());
        assert_eq!(intent.urgency, Urgency::Low);
        assert_eq!(intent.time_frame, TimeFrame::Recent);
        assert_eq!(intent.data_types, vec!["status"]);
    }

    #[test]
    fn test_whitespace_only_query() {
        let intent = classify("   \t\n ");
        assert_eq!(intent.primary, "");
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn test_troubleshoot_query() {
        let intent = classify("why is chat erroring?");
        assert_eq!(intent.primary, "troubleshoot");
        // why (0.6) + erroring (1.0) over 4 tokens
        assert!((intent.confidence - 0.4).abs() < 1e-9);
        assert_eq!(intent.target_services, vec!["bedrock"]);
        assert_eq!(intent.urgency, Urgency::Medium);
        assert_eq!(intent.data_types, vec!["logs"]);
    }

    #[test]
    fn test_lambda_errors_query() {
        let intent = classify("lambda is throwing errors");
        assert_eq!(intent.primary, "troubleshoot");
        assert!((intent.confidence - 0.45).abs() < 1e-9);
        assert!(intent.targets("lambda"));
        assert_eq!(intent.urgency, Urgency::Medium);
    }

    #[test]
    fn test_urgency_thresholds() {
        assert_eq!(Urgency::from_score(0.0), Urgency::Low);
        assert_eq!(Urgency::from_score(0.29), Urgency::Low);
        assert_eq!(Urgency::from_score(0.3), Urgency::Medium);
        assert_eq!(Urgency::from_score(0.7), Urgency::High);
        assert_eq!(Urgency::from_score(1.0), Urgency::Critical);
        assert_eq!(classify("production outage urgent").urgency, Urgency::Critical);
    }

    #[test]
    fn test_time_frame_first_match_wins() {
        assert_eq!(classify("errors yesterday and now").time_frame, TimeFrame::Historical);
        assert_eq!(classify("what is failing now").time_frame, TimeFrame::RealTime);
        assert_eq!(classify("check the queue").time_frame, TimeFrame::Recent);
    }

    #[test]
    fn test_tie_break_uses_priority_order() {
        // "status" (monitor 0.9) vs "trend" (analyze 0.9)
        let intent = classify("status trend");
        assert_eq!(intent.primary, "monitor");
        assert_eq!(intent.secondary, vec!["analyze"]);

        // Deterministic across repeated runs
        for _ in 0..10 {
            assert_eq!(classify("status trend").primary, "monitor");
        }
    }

    #[test]
    fn test_default_data_types_by_primary() {
        assert_eq!(
            classify("fix it").data_types,
            vec!["logs", "metrics", "status"]
        );
        assert_eq!(classify("watch the fleet").data_types, vec!["metrics", "status"]);
        assert_eq!(classify("analyze usage").data_types, vec!["logs", "metrics"]);
        assert_eq!(classify("hello there").data_types, vec!["status"]);
    }

    #[test]
    fn test_data_types_are_deduplicated() {
        let intent = classify("errors and more errors in the logs, plus cpu metrics");
        assert_eq!(intent.data_types, vec!["logs", "metrics"]);
    }

    #[test]
    fn test_confidence_bounded_for_varied_queries() {
        let queries = [
            "",
            "error",
            "error error error error",
            "why is the rds database slow and expensive this week",
            "SECURITY breach!!! unauthorized access to bucket",
            "🔥🔥🔥",
            "a b c d e f g h i j k l m n o p",
        ];
        for q in queries {
            let intent = classify(q);
            assert!(
                (0.0..=1.0).contains(&intent.confidence),
                "confidence out of range for {q:?}"
            );
            assert!(matches!(
                intent.urgency,
                Urgency::Low | Urgency::Medium | Urgency::High | Urgency::Critical
            ));
        }
    }

    #[test]
    fn test_services_matched_by_substring() {
        let intent = classify("Postgres DATABASE behind the API Gateway");
        assert_eq!(intent.target_services, vec!["api_gateway", "rds"]);
    }

    #[test]
    fn test_urgency_rank() {
        assert_eq!(Urgency::Low.rank(), 1);
        assert_eq!(Urgency::Critical.rank(), 4);
        assert_eq!(Urgency::High.to_string(), "high");
        assert_eq!(TimeFrame::RealTime.to_string(), "real_time");
    }
}
