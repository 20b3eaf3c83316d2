//! Built-in investigation decision tree.

use serde_json::json;

use super::tree::{DecisionNode, DecisionTree};
use crate::collectors::CollectorCategory;

/// Default rule tree used when no custom tree is supplied.
///
/// Structure:
/// - `investigation_root` (always) routes the query
///   - `logs_needed` → log collector
///     - `error_focus` narrows to error events
///     - `recent_window` shortens the window
///   - `infrastructure_check` → infrastructure collector
///   - `performance_needed` → infrastructure, metrics, performance
///   - `security_needed` → infrastructure, security
///   - `cost_needed` → infrastructure, cost
///
/// Categories that depend on infrastructure evidence always ask for the
/// infrastructure collector too, otherwise they would be skipped.
pub fn default_tree() -> DecisionTree {
    DecisionTree::new(
        DecisionNode::new("investigation_root", "Investigation root")
            .with_action("route_query")
            .with_priority(10)
            .with_child(logs_node())
            .with_child(
                DecisionNode::new("infrastructure_check", "Infrastructure check")
                    .when(
                        "contains_keywords(['down', 'unavailable', 'status', 'health', 'deploy', \
                         'instance', 'cluster', 'not responding', 'outage', 'error', 'fail'])",
                    )
                    .with_action("inspect_resources")
                    .with_priority(7)
                    .collects(vec![CollectorCategory::Infrastructure]),
            )
            .with_child(
                DecisionNode::new("performance_needed", "Performance analysis")
                    .when(
                        "contains_keywords(['slow', 'latency', 'performance', 'timeout', 'cpu', \
                         'memory', 'throttl', 'saturat'])",
                    )
                    .with_action("profile_latency")
                    .with_priority(8)
                    .collects(vec![
                        CollectorCategory::Infrastructure,
                        CollectorCategory::Metrics,
                        CollectorCategory::Performance,
                    ])
                    .with_param("period_secs", json!(60)),
            )
            .with_child(
                DecisionNode::new("security_needed", "Security review")
                    .when(
                        "contains_keywords(['security', 'unauthorized', 'denied', 'breach', 'iam', \
                         'permission', 'attack', 'suspicious'])",
                    )
                    .with_action("review_access")
                    .with_priority(8)
                    .collects(vec![
                        CollectorCategory::Infrastructure,
                        CollectorCategory::Security,
                    ]),
            )
            .with_child(
                DecisionNode::new("cost_needed", "Cost review")
                    .when("contains_keywords(['cost', 'bill', 'spend', 'expensive', 'budget'])")
                    .with_action("break_down_spend")
                    .with_priority(6)
                    .collects(vec![CollectorCategory::Infrastructure, CollectorCategory::Cost])
                    .with_param("granularity", json!("daily")),
            ),
    )
}

fn logs_node() -> DecisionNode {
    DecisionNode::new("logs_needed", "Logs needed")
        .when(
            "contains_keywords(['error', 'exception', 'fail', 'crash', 'throw', 'log', '5xx', \
             'timeout', 'bug'])",
        )
        .with_action("collect_logs")
        .with_priority(8)
        .collects(vec![CollectorCategory::Log])
        .with_param("time_range", json!("1h"))
        .with_child(
            DecisionNode::new("error_focus", "Error focus")
                .when("contains_keywords(['error', 'exception', 'throw', 'crash'])")
                .with_action("filter_error_events")
                .with_priority(9)
                .collects(vec![CollectorCategory::Log])
                .with_param("time_range", json!("1h"))
                .with_param("filter_pattern", json!("ERROR")),
        )
        .with_child(
            DecisionNode::new("recent_window", "Recent window")
                .when(
                    "contains_keywords(['recent', 'just now', 'right now', 'today', 'last hour', \
                     'currently'])",
                )
                .with_action("narrow_time_window")
                .with_priority(10)
                .collects(vec![CollectorCategory::Log])
                .with_param("time_range", json!("15m"))
                .with_param("filter_pattern", json!("ERROR")),
        )
}
