//! LLM-driven compilation of guideline text into constraints
//!
//! Generation, validation and the bounded retry loop around them. The AST and
//! the code generator live in `constraint-core`; nothing here touches a
//! database.
//!
//! ## Architecture
//!
//! ```text
//! Guideline text → Generator → Constraint → Validator ─ accepted → DSL source
//!                      ↑                        │
//!                      └──── failures ──────────┘ (at most max_attempts)
//! ```
//!
//! ## Backend Selection
//!
//! Set `GUIDELINE_BACKEND` environment variable:
//! - `anthropic` (default): Anthropic Claude API
//! - `openai`: OpenAI API

// LLM client abstraction
pub mod anthropic_client;
pub mod backend;
pub mod client_factory;
pub mod llm_client;
pub mod openai_client;

// Core agentic modules
pub mod config;
pub mod error;
pub mod feedback;
pub mod generator;
pub mod oracle;
pub mod solver;
pub mod validator;

// Re-exports for convenience
pub use backend::LlmBackend;
pub use client_factory::create_llm_client;
pub use config::{ConfigError, FailureCarry, OrchestratorConfig};
pub use error::OrchestrationError;
pub use feedback::{CompiledGuideline, FeedbackLoop, ParsedGuideline};
pub use generator::{ConstraintGenerator, LlmConstraintGenerator};
pub use llm_client::LlmClient;
pub use oracle::{LlmSemanticOracle, PassThroughOracle, SemanticOracle, Verdict};
pub use solver::{BoundsChecker, SatisfiabilityChecker, Unconstrained};
pub use validator::{CandidateValidator, ConstraintValidator, ValidationOutcome};
