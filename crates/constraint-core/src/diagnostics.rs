//! Validation failures
//!
//! A failure pins a check result to the sub-node that caused it, so the
//! generator can be told exactly which part of its candidate to fix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodePath};

/// Symbolic identifier of the check that produced a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    // =========================================================================
    // Well-formedness
    // =========================================================================
    MalformedOutput,
    InvalidIdentifier,
    InvalidTaskPath,
    EmptyCombinator,
    InvalidLiteral,

    // =========================================================================
    // Shape of the top-level candidate
    // =========================================================================
    NotBooleanProducing,
    DisallowedKind,

    // =========================================================================
    // External checks
    // =========================================================================
    Unsatisfiable,
    SemanticDisagreement,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::MalformedOutput => "MALFORMED_OUTPUT",
            FailureCode::InvalidIdentifier => "INVALID_IDENTIFIER",
            FailureCode::InvalidTaskPath => "INVALID_TASK_PATH",
            FailureCode::EmptyCombinator => "EMPTY_COMBINATOR",
            FailureCode::InvalidLiteral => "INVALID_LITERAL",
            FailureCode::NotBooleanProducing => "NOT_BOOLEAN_PRODUCING",
            FailureCode::DisallowedKind => "DISALLOWED_KIND",
            FailureCode::Unsatisfiable => "UNSATISFIABLE",
            FailureCode::SemanticDisagreement => "SEMANTIC_DISAGREEMENT",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check, tagged with the offending sub-node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub code: FailureCode,
    pub path: NodePath,
    pub node: Node,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(
        code: FailureCode,
        path: NodePath,
        node: impl Into<Node>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path,
            node: node.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] at {} ({}): {}",
            self.code,
            self.path,
            self.node.kind(),
            self.message
        )
    }
}
