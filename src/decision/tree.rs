//! Decision nodes, conditions and traversal.

use serde::{Deserialize, Serialize};

use crate::collectors::CollectorCategory;
use crate::executor::Parameters;

// ============================================================================
// Conditions
// ============================================================================

/// Parsed form of a node's condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Always matches
    Always,
    /// Matches when the lower-cased query contains any keyword
    ContainsKeywords(Vec<String>),
    /// Any expression we don't understand; never matches
    Unsupported(String),
}

impl Condition {
    /// Parse a condition expression.
    ///
    /// Supported forms are `always` and `contains_keywords(['a', "b"])`.
    pub fn parse(expr: &str) -> Self {
        let trimmed = expr.trim();
        if trimmed == "always" {
            return Condition::Always;
        }

        let list = trimmed
            .strip_prefix("contains_keywords(")
            .and_then(|rest| rest.strip_suffix(')'))
            .map(str::trim)
            .and_then(|inner| inner.strip_prefix('['))
            .and_then(|inner| inner.strip_suffix(']'));

        match list {
            Some(list) => {
                let keywords: Vec<String> = list
                    .split(',')
                    .map(|k| k.trim().trim_matches(|c: char| c == '\'' || c == '"').to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                if keywords.is_empty() {
                    Condition::Unsupported(trimmed.to_string())
                } else {
                    Condition::ContainsKeywords(keywords)
                }
            }
            None => Condition::Unsupported(trimmed.to_string()),
        }
    }

    /// Evaluate against an already lower-cased query.
    pub fn matches(&self, lowered_query: &str) -> bool {
        match self {
            Condition::Always => true,
            Condition::ContainsKeywords(keywords) => {
                keywords.iter().any(|k| lowered_query.contains(k.as_str()))
            }
            Condition::Unsupported(_) => false,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// One rule in the decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionNode {
    /// Unique node identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Condition expression, see [`Condition::parse`].
    pub condition: String,
    /// Informational label describing what the node decides.
    pub action: String,
    /// Priority 1-10, used to pick parameters when categories overlap.
    pub priority: u8,
    /// Collector categories this node asks for.
    #[serde(default)]
    pub collector_categories: Vec<CollectorCategory>,
    /// Parameters handed to the collectors.
    #[serde(default)]
    pub parameters: Parameters,
    /// Refinements evaluated only when this node matches.
    #[serde(default)]
    pub children: Vec<DecisionNode>,
}

impl DecisionNode {
    /// Create a node with an `always` condition and priority 5.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            condition: "always".to_string(),
            action: String::new(),
            priority: 5,
            collector_categories: Vec::new(),
            parameters: Parameters::new(),
            children: Vec::new(),
        }
    }

    /// Set the condition expression.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Set the action label.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the priority, clamped to 1-10.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// Set the collector categories.
    pub fn collects(mut self, categories: Vec<CollectorCategory>) -> Self {
        self.collector_categories = categories;
        self
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Append a child node.
    pub fn with_child(mut self, child: DecisionNode) -> Self {
        self.children.push(child);
        self
    }

    /// Parsed condition.
    pub fn parsed_condition(&self) -> Condition {
        Condition::parse(&self.condition)
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Audit trail of one traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    /// Ids of matched nodes, in traversal order.
    pub current_path: Vec<String>,
    /// `"<name>: <action>"` for each matched node.
    pub decisions_applied: Vec<String>,
}

/// Nodes matched by one traversal, plus its trace.
#[derive(Debug, Clone, Default)]
pub struct TreeEvaluation {
    /// Matched nodes in pre-order, root first. Children are not included inline.
    pub nodes: Vec<DecisionNode>,
    /// Trace of the traversal.
    pub trace: DecisionTrace,
}

impl TreeEvaluation {
    /// Whether any matched node asks for at least one collector.
    pub fn has_applicable_nodes(&self) -> bool {
        self.nodes.iter().any(|n| !n.collector_categories.is_empty())
    }

    /// Distinct categories across matched nodes, in first-seen order.
    pub fn categories(&self) -> Vec<CollectorCategory> {
        let mut seen = Vec::new();
        for category in self.nodes.iter().flat_map(|n| &n.collector_categories) {
            if !seen.contains(category) {
                seen.push(*category);
            }
        }
        seen
    }
}

/// A static rule tree.
///
/// The tree never records traversal state; every call to
/// [`DecisionTree::applicable_nodes`] returns its own [`DecisionTrace`], so one
/// tree can be shared by concurrent investigations.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: DecisionNode,
}

impl DecisionTree {
    /// Build a tree from its root node.
    pub fn new(root: DecisionNode) -> Self {
        Self { root }
    }

    /// Root node.
    pub fn root(&self) -> &DecisionNode {
        &self.root
    }

    /// Evaluate the tree against a query.
    ///
    /// Matched nodes are returned in pre-order. A node's children are only
    /// visited when the node itself matched.
    pub fn applicable_nodes(&self, query: &str) -> TreeEvaluation {
        let lowered = query.to_lowercase();
        let mut evaluation = TreeEvaluation::default();
        visit(&self.root, &lowered, &mut evaluation);
        evaluation
    }
}

fn visit(node: &DecisionNode, lowered: &str, evaluation: &mut TreeEvaluation) {
    if !node.parsed_condition().matches(lowered) {
        return;
    }

    evaluation.trace.current_path.push(node.id.clone());
    evaluation
        .trace
        .decisions_applied
        .push(format!("{}: {}", node.name, node.action));

    let mut matched = node.clone();
    matched.children.clear();
    evaluation.nodes.push(matched);

    for child in &node.children {
        visit(child, lowered, evaluation);
    }
}
