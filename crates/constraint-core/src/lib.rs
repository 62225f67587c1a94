//! constraint-core: Constraint AST and DSL code generation
//!
//! This crate contains the pure compilation logic with NO network dependencies:
//! - AST types (Node, Constraint, operands, NodeKind tags)
//! - Codegen from AST to single-line rule-DSL source
//! - Structural lint of candidates and emitted source
//! - Failure diagnostics fed back to the generator
//!
//! Generation, validation against external services, and the retry loop live
//! in `guideline-agentic`.

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod lint;

// Re-export commonly used types
pub use ast::{
    AffineExpression, AffineTerm, AllOf, ComparisonConstraint, Constraint, If,
    MaintainRatioConstraint, Node, NodeKind, NodePath, NumericValue, OneOf, Operand, Operator,
    Scalar, TaskConstraint, TaskPath, TaskResult, TaskRoot, Value, Variable,
};
pub use codegen::{compile, compile_constraint, Emit};
pub use diagnostics::{FailureCode, ValidationFailure};
pub use lint::{is_boolean_source, is_identifier, lint_constraint, lint_source};
