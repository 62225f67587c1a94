//! Orchestration errors
//!
//! Validation failures are data and never appear here. These are the ways a
//! run ends without a compiled guideline.

use constraint_core::{NodeKind, ValidationFailure};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Every attempt in the budget was rejected by the validator
    #[error("no valid constraint within attempt budget ({attempts} attempts, {} failures in last round)", failures.len())]
    Exhausted {
        attempts: usize,
        failures: Vec<ValidationFailure>,
    },

    /// The generator produced a candidate outside the allowed top-level kinds
    #[error("no acceptable candidate: generator returned {kind}, allowed {allowed:?}")]
    NoAcceptableCandidate {
        kind: NodeKind,
        allowed: Vec<NodeKind>,
    },

    /// The loop was built with a config that fails validation
    #[error("invalid orchestrator config: {0}")]
    Config(#[from] ConfigError),

    #[error("generator failed: {0:#}")]
    Generator(#[source] anyhow::Error),

    #[error("validator failed: {0:#}")]
    Validator(#[source] anyhow::Error),
}

impl OrchestrationError {
    /// True when the run ended by using up its attempt budget
    pub fn is_exhausted(&self) -> bool {
        matches!(self, OrchestrationError::Exhausted { .. })
    }
}
