//! Guideline Builder
//!
//! Compiles mortgage underwriting guideline text into single-line rule-DSL
//! programs.
//!
//! ## Pipeline
//! Guideline text -> Generator -> Constraint tree -> Validator -> DSL source
//!
//! ## Quick Start
//!
//! ```rust
//! use guideline_builder::compile_node_json;
//!
//! let json = r#"{"typename":"ComparisonConstraint",
//!     "lhs":{"typename":"Variable","name":"fico"},
//!     "operator":">=",
//!     "rhs":{"typename":"Value","type":"number","value":620}}"#;
//! assert_eq!(compile_node_json(json).unwrap(), "vars.fico.is_gte(620)");
//! ```

// Core error handling
pub mod error;

pub use constraint_core;
pub use guideline_agentic;

pub use error::GuidelineError;

use constraint_core::{compile, Constraint, Node};

/// Compile any node given as JSON, operands included
pub fn compile_node_json(json: &str) -> Result<String, GuidelineError> {
    let node: Node = serde_json::from_str(json)?;
    Ok(compile(&node))
}

/// Read a rule tree from JSON, rejecting bare operands
pub fn parse_constraint_json(json: &str) -> Result<Constraint, GuidelineError> {
    let node: Node = serde_json::from_str(json)?;
    node.into_constraint()
        .map_err(|node| GuidelineError::NotAConstraint(node.kind()))
}
