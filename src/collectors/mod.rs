//! Evidence collector categories and their static dependency table.
//!
//! Each [`CollectorCategory`] is bound to a [`DependencySpec`] that says which
//! evidence keys must exist before it may run, which keys it publishes, and in
//! which execution stage it belongs. The coordinator turns the `execution_order`
//! numbers into sequential stages, so the table itself encodes the dependency
//! graph.
//!
//! Evidence keys have the form `<category>_<operation>`.

mod analysis;
mod catalog;

pub use analysis::{analyze_error_patterns, ErrorPatternSummary, ERROR_PATTERNS_KEY};
pub use catalog::{OperationCatalog, OperationsProvider};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A kind of evidence collector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CollectorCategory {
    /// Log events and error patterns
    Log,
    /// Time-series metrics
    Metrics,
    /// Service inventory and resource state
    Infrastructure,
    /// Security findings and access anomalies
    Security,
    /// Spend breakdown
    Cost,
    /// Latency and saturation profile
    Performance,
}

impl CollectorCategory {
    /// Every category, in table order.
    pub const ALL: [CollectorCategory; 6] = [
        CollectorCategory::Infrastructure,
        CollectorCategory::Log,
        CollectorCategory::Metrics,
        CollectorCategory::Security,
        CollectorCategory::Performance,
        CollectorCategory::Cost,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorCategory::Log => "log",
            CollectorCategory::Metrics => "metrics",
            CollectorCategory::Infrastructure => "infrastructure",
            CollectorCategory::Security => "security",
            CollectorCategory::Cost => "cost",
            CollectorCategory::Performance => "performance",
        }
    }

    /// Evidence key for a result produced by this category.
    pub fn evidence_key(&self, result: &str) -> String {
        format!("{}_{}", self.as_str(), result)
    }

    /// Static dependency table entry for this category.
    pub fn spec(&self) -> DependencySpec {
        match self {
            CollectorCategory::Infrastructure => DependencySpec {
                required_data: &[],
                provided_data: &["infrastructure_services", "infrastructure_resources"],
                execution_order: 1,
                wait_timeout: Duration::from_secs(60),
            },
            CollectorCategory::Log => DependencySpec {
                required_data: &[],
                provided_data: &["log_error_events", "log_recent_events", "log_error_patterns"],
                execution_order: 1,
                wait_timeout: Duration::from_secs(90),
            },
            CollectorCategory::Metrics => DependencySpec {
                required_data: &["infrastructure_services"],
                provided_data: &["metrics_series", "metrics_alarms"],
                execution_order: 2,
                wait_timeout: Duration::from_secs(60),
            },
            CollectorCategory::Security => DependencySpec {
                required_data: &["infrastructure_services"],
                provided_data: &["security_findings", "security_access_events"],
                execution_order: 2,
                wait_timeout: Duration::from_secs(90),
            },
            CollectorCategory::Performance => DependencySpec {
                required_data: &["metrics_series"],
                provided_data: &["performance_latency_profile"],
                execution_order: 3,
                wait_timeout: Duration::from_secs(60),
            },
            CollectorCategory::Cost => DependencySpec {
                required_data: &["infrastructure_services"],
                provided_data: &["cost_breakdown"],
                execution_order: 3,
                wait_timeout: Duration::from_secs(120),
            },
        }
    }
}

impl std::fmt::Display for CollectorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CollectorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" | "logs" => Ok(CollectorCategory::Log),
            "metrics" => Ok(CollectorCategory::Metrics),
            "infrastructure" => Ok(CollectorCategory::Infrastructure),
            "security" => Ok(CollectorCategory::Security),
            "cost" => Ok(CollectorCategory::Cost),
            "performance" => Ok(CollectorCategory::Performance),
            _ => Err(format!("Unknown collector category: {}", s)),
        }
    }
}

/// What a category needs, what it provides, and when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySpec {
    /// Evidence keys that must already exist before this category runs.
    pub required_data: &'static [&'static str],
    /// Evidence keys this category may publish.
    pub provided_data: &'static [&'static str],
    /// Stage number, lower runs earlier.
    pub execution_order: u32,
    /// Advisory time budget, logged only. The overall deadline is what's enforced.
    pub wait_timeout: Duration,
}

impl DependencySpec {
    /// Whether every required key is present according to `has_key`.
    pub fn dependencies_satisfied(&self, has_key: impl Fn(&str) -> bool) -> bool {
        self.required_data.iter().all(|k| has_key(k))
    }

    /// Required keys for which `has_key` returns false.
    pub fn missing_dependencies(&self, has_key: impl Fn(&str) -> bool) -> Vec<String> {
        self.required_data
            .iter()
            .filter(|k| !has_key(k))
            .map(|k| k.to_string())
            .collect()
    }

    /// Whether `key` is one of the keys this category publishes.
    pub fn provides(&self, key: &str) -> bool {
        self.provided_data.contains(&key)
    }
}

/// Check that every required key is provided by a strictly earlier stage.
///
/// Returns a description of each violation.
pub fn validate_dependency_table() -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    for category in CollectorCategory::ALL {
        let spec = category.spec();
        for required in spec.required_data {
            let provided_earlier = CollectorCategory::ALL.iter().any(|other| {
                let other_spec = other.spec();
                other_spec.execution_order < spec.execution_order && other_spec.provides(required)
            });
            if !provided_earlier {
                violations.push(format!(
                    "{} requires '{}' which no earlier stage provides",
                    category, required
                ));
            }
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_consistent() {
        assert_eq!(validate_dependency_table(), Ok(()));
    }

    #[test]
    fn test_provided_keys_are_prefixed_by_category() {
        for category in CollectorCategory::ALL {
            for key in category.spec().provided_data {
                assert!(
                    key.starts_with(&format!("{}_", category.as_str())),
                    "{key} not prefixed by {category}"
                );
            }
        }
    }

    #[test]
    fn test_dependencies_satisfied() {
        let spec = CollectorCategory::Performance.spec();
        assert!(!spec.dependencies_satisfied(|_| false));
        assert!(spec.dependencies_satisfied(|k| k == "metrics_series"));
        assert_eq!(spec.missing_dependencies(|_| false), vec!["metrics_series"]);
        assert!(CollectorCategory::Log.spec().dependencies_satisfied(|_| false));
    }

    #[test]
    fn test_category_string_conversion() {
        for category in CollectorCategory::ALL {
            assert_eq!(category.as_str().parse::<CollectorCategory>(), Ok(category));
        }
        assert_eq!("logs".parse::<CollectorCategory>(), Ok(CollectorCategory::Log));
        assert!("firewall".parse::<CollectorCategory>().is_err());
        assert_eq!(CollectorCategory::Cost.evidence_key("breakdown"), "cost_breakdown");
    }
}
