//! Append-only reasoning log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the chain of thought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    /// 1-based position in the chain.
    pub step: usize,
    /// What was observed or considered.
    pub thought: String,
    /// What was done about it.
    pub action: String,
    /// What came out of it.
    pub outcome: String,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

/// Chronological log of an investigation's reasoning.
///
/// Entries can only be appended; existing entries are never exposed mutably.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChainOfThought {
    steps: Vec<ThoughtStep>,
}

impl ChainOfThought {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it.
    pub fn record(
        &mut self,
        thought: impl Into<String>,
        action: impl Into<String>,
        outcome: impl Into<String>,
    ) -> &ThoughtStep {
        let step = ThoughtStep {
            step: self.steps.len() + 1,
            thought: thought.into(),
            action: action.into(),
            outcome: outcome.into(),
            timestamp: Utc::now(),
        };
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    /// Entries in order.
    pub fn steps(&self) -> &[ThoughtStep] {
        &self.steps
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_and_ordered() {
        let mut chain = ChainOfThought::new();
        chain.record("first", "a", "ok");
        let second = chain.record("second", "b", "ok").clone();

        assert_eq!(chain.len(), 2);
        assert_eq!(second.step, 2);
        assert_eq!(chain.steps()[0].thought, "first");
        assert!(chain.steps()[0].timestamp <= chain.steps()[1].timestamp);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut chain = ChainOfThought::new();
        chain.record("t", "a", "o");
        let value = serde_json::to_value(&chain).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["action"], "a");
    }
}
