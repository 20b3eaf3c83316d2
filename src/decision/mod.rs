//! Rule-based decision tree that maps a query onto collector categories.
//!
//! This module provides:
//! - [`DecisionNode`]: a weighted rule with a condition, categories and parameters
//! - [`DecisionTree`]: a static tree evaluated in pre-order with parent gating
//! - [`default_tree`]: the built-in investigation rules

mod builtins;
mod tree;

pub use builtins::default_tree;
pub use tree::*;
