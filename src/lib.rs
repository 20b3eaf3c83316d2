//! # Ops Investigator
//!
//! An investigation orchestrator for operational questions such as
//! "why is chat erroring?". A query is classified into an intent, routed
//! through a rule tree onto evidence collector categories, and the collectors
//! run in dependency-ordered parallel stages against an external operation
//! executor. Evidence, a chain-of-thought log and run metadata come back as one
//! session.
//!
//! ## Features
//!
//! - **Query classification**: keyword-weighted intent, urgency, services and time frame
//! - **Decision tree**: static rules with parent-gated refinements
//! - **Staged coordinator**: concurrent collectors per stage, dependency skips, deadline and cancellation
//! - **Fallback loop**: bounded keyword-driven collection when no rule applies
//! - **Investigation memory**: similar-investigation recall, learned patterns, service health
//!
//! ## Architecture
//!
//! ```text
//! query → classifier → Intent
//!       → decision tree → matched nodes
//!       → coordinator → OperationExecutor (process / custom)
//!       → evidence + chain of thought → memory
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ops_investigator::{Config, Investigator, OperationCatalog, ProcessExecutor};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let executor = Arc::new(ProcessExecutor::new(&config.executor));
//!     let investigator = Investigator::new(
//!         config.investigation.clone(),
//!         executor,
//!         Arc::new(OperationCatalog::default()),
//!     );
//!     let session = investigator
//!         .investigate(&CancellationToken::new(), "lambda is throwing errors", config.investigation.deadline())
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&session)?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Query classification into an intent.
pub mod classifier;
/// Collector categories, dependency table and operation catalog.
pub mod collectors;
/// Configuration management.
pub mod config;
/// Dependency-staged parallel collector execution.
pub mod coordinator;
/// Rule tree mapping queries onto collector categories.
pub mod decision;
/// Error types and result aliases for the application.
pub mod error;
/// Operation executor contract and the process-backed implementation.
pub mod executor;
/// Bounded memory of past investigations.
pub mod memory;
/// End-to-end investigation sessions.
pub mod session;

pub use classifier::{classify, Intent, TimeFrame, Urgency};
pub use collectors::{CollectorCategory, OperationCatalog, OperationsProvider};
pub use config::Config;
pub use coordinator::{CollectorStatus, Coordinator, CoordinatorOutcome, Evidence};
pub use decision::{default_tree, DecisionNode, DecisionTree};
pub use error::{AppError, AppResult, ExecutorError, InvestigationError};
pub use executor::{OperationCall, OperationExecutor, Parameters, ProcessExecutor};
pub use memory::InvestigationMemory;
pub use session::{InvestigationSession, InvestigationStatus, Investigator};
