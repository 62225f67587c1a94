//! Errors for reading guideline inputs at the crate boundary

use constraint_core::NodeKind;
use guideline_agentic::{ConfigError, OrchestrationError};
use thiserror::Error;

/// Top-level error type for the guideline builder
#[derive(Error, Debug)]
pub enum GuidelineError {
    #[error("Invalid node JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a rule, got a {0} operand")]
    NotAConstraint(NodeKind),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Orchestration failed: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
