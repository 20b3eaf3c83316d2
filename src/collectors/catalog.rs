//! Mapping from collector categories to concrete executor operations.

use std::collections::HashMap;

use serde_json::json;

use super::CollectorCategory;
use crate::executor::{OperationCall, Parameters};

/// Supplies the ordered operation list a collector runs.
///
/// Implemented for closures so tests and embedders can supply ad-hoc lists.
pub trait OperationsProvider: Send + Sync {
    /// Operations for `category`, given the parameters chosen for this run.
    fn operations(&self, category: CollectorCategory, parameters: &Parameters)
        -> Vec<OperationCall>;
}

impl<F> OperationsProvider for F
where
    F: Fn(CollectorCategory, &Parameters) -> Vec<OperationCall> + Send + Sync,
{
    fn operations(
        &self,
        category: CollectorCategory,
        parameters: &Parameters,
    ) -> Vec<OperationCall> {
        self(category, parameters)
    }
}

/// Table of operation templates per category.
///
/// Each template's own parameters act as defaults; the run parameters are
/// layered on top.
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    templates: HashMap<CollectorCategory, Vec<OperationCall>>,
}

impl OperationCatalog {
    /// Create an empty catalog.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Replace the operations for a category.
    pub fn with_operations(mut self, category: CollectorCategory, ops: Vec<OperationCall>) -> Self {
        self.templates.insert(category, ops);
        self
    }

    /// Operation templates registered for a category.
    pub fn templates(&self, category: CollectorCategory) -> &[OperationCall] {
        self.templates
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::empty()
            .with_operations(
                CollectorCategory::Infrastructure,
                vec![
                    OperationCall::new("services"),
                    OperationCall::new("resources"),
                ],
            )
            .with_operations(
                CollectorCategory::Log,
                vec![
                    OperationCall::new("error_events")
                        .with_param("filter_pattern", json!("ERROR"))
                        .with_param("limit", json!(200)),
                    OperationCall::new("recent_events").with_param("limit", json!(100)),
                ],
            )
            .with_operations(
                CollectorCategory::Metrics,
                vec![
                    OperationCall::new("series").with_param("period_secs", json!(300)),
                    OperationCall::new("alarms"),
                ],
            )
            .with_operations(
                CollectorCategory::Security,
                vec![
                    OperationCall::new("findings"),
                    OperationCall::new("access_events"),
                ],
            )
            .with_operations(
                CollectorCategory::Performance,
                vec![OperationCall::new("latency_profile").with_param("percentiles", json!([50, 95, 99]))],
            )
            .with_operations(CollectorCategory::Cost, vec![OperationCall::new("breakdown")])
    }
}

impl OperationsProvider for OperationCatalog {
    fn operations(
        &self,
        category: CollectorCategory,
        parameters: &Parameters,
    ) -> Vec<OperationCall> {
        self.templates(category)
            .iter()
            .map(|template| {
                let mut call = template.clone();
                for (key, value) in parameters {
                    call.parameters.insert(key.clone(), value.clone());
                }
                call
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_covers_provided_keys() {
        let catalog = OperationCatalog::default();
        for category in CollectorCategory::ALL {
            let spec = category.spec();
            for op in catalog.templates(category) {
                let key = category.evidence_key(&op.name);
                assert!(spec.provides(&key), "{key} not provided by {category}");
            }
        }
    }

    #[test]
    fn test_run_parameters_override_template_defaults() {
        let catalog = OperationCatalog::default();
        let mut params = Parameters::new();
        params.insert("filter_pattern".to_string(), json!("Exception"));
        params.insert("time_range".to_string(), json!("15m"));

        let ops = catalog.operations(CollectorCategory::Log, &params);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "error_events");
        assert_eq!(ops[0].parameters["filter_pattern"], json!("Exception"));
        assert_eq!(ops[0].parameters["limit"], json!(200));
        assert_eq!(ops[1].parameters["time_range"], json!("15m"));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |category: CollectorCategory, _: &Parameters| {
            vec![OperationCall::new(format!("{}_check", category))]
        };
        let ops = provider.operations(CollectorCategory::Cost, &Parameters::new());
        assert_eq!(ops, vec![OperationCall::new("cost_check")]);
    }

    #[test]
    fn test_empty_catalog_yields_no_operations() {
        let catalog = OperationCatalog::empty();
        assert!(catalog
            .operations(CollectorCategory::Log, &Parameters::new())
            .is_empty());
    }
}
