//! Feedback Loop
//!
//! Bounded retry loop: generate a candidate, validate it, and feed the
//! failures back into the next generation until one passes or the attempt
//! budget runs out.

use std::sync::Arc;

use anyhow::Result;
use constraint_core::{Constraint, ValidationFailure};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client_factory::create_llm_client;
use crate::config::{FailureCarry, OrchestratorConfig};
use crate::error::OrchestrationError;
use crate::generator::{ConstraintGenerator, LlmConstraintGenerator};
use crate::oracle::LlmSemanticOracle;
use crate::solver::BoundsChecker;
use crate::validator::{CandidateValidator, ConstraintValidator, ValidationOutcome};

/// Guideline text split into its heading and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedGuideline {
    pub title: String,
    pub body: String,
}

impl ParsedGuideline {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Text handed to the generator
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.title, self.body)
    }
}

/// Compiled source of the accepted candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledGuideline {
    pub source: String,
    pub attempts: usize,
}

enum RunState {
    Attempting {
        depth: usize,
        failures: Vec<ValidationFailure>,
    },
    Succeeded(CompiledGuideline),
    /// Terminal failure; budget exhaustion or a collaborator error
    Exhausted(OrchestrationError),
}

/// Feedback loop over a generator and a validator
pub struct FeedbackLoop {
    generator: Arc<dyn ConstraintGenerator>,
    validator: Arc<dyn CandidateValidator>,
    config: OrchestratorConfig,
}

impl FeedbackLoop {
    pub fn new(
        generator: Arc<dyn ConstraintGenerator>,
        validator: Arc<dyn CandidateValidator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            generator,
            validator,
            config,
        }
    }

    /// LLM generator and oracle sharing one client, with the local bounds checker
    pub fn with_llm(config: OrchestratorConfig) -> Result<Self> {
        let client = create_llm_client()?;
        let generator = LlmConstraintGenerator::new(client.clone());
        let validator = ConstraintValidator::new(
            Arc::new(BoundsChecker),
            Arc::new(LlmSemanticOracle::new(client)),
            config.allowed_kinds.clone(),
        );
        Ok(Self::new(Arc::new(generator), Arc::new(validator), config))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run the loop on raw guideline text
    pub async fn compile_guideline(
        &self,
        raw_text: &str,
    ) -> Result<CompiledGuideline, OrchestrationError> {
        self.config.validate()?;

        let mut state = RunState::Attempting {
            depth: 0,
            failures: Vec::new(),
        };

        loop {
            state = match state {
                RunState::Attempting { depth, failures } => {
                    self.attempt(raw_text, depth, failures).await
                }
                RunState::Succeeded(compiled) => return Ok(compiled),
                RunState::Exhausted(err) => return Err(err),
            };
        }
    }

    pub async fn compile_parsed(
        &self,
        guideline: &ParsedGuideline,
    ) -> Result<CompiledGuideline, OrchestrationError> {
        self.compile_guideline(&guideline.text()).await
    }

    async fn attempt(
        &self,
        raw_text: &str,
        depth: usize,
        failures: Vec<ValidationFailure>,
    ) -> RunState {
        let attempt = depth + 1;
        info!(
            attempt,
            max_attempts = self.config.max_attempts,
            prior_failures = failures.len(),
            "Generating candidate"
        );

        let candidate: Constraint = match self
            .generator
            .generate(raw_text, &self.config.allowed_kinds, &failures)
            .await
        {
            Ok(candidate) => candidate,
            Err(e) => return RunState::Exhausted(OrchestrationError::Generator(e)),
        };

        let kind = candidate.kind();
        if !self.config.allows(kind) {
            warn!(attempt, %kind, "Generator returned a disallowed kind");
            return RunState::Exhausted(OrchestrationError::NoAcceptableCandidate {
                kind,
                allowed: self.config.allowed_kinds.clone(),
            });
        }

        let outcome = match self.validator.validate(raw_text, &candidate).await {
            Ok(outcome) => outcome,
            Err(e) => return RunState::Exhausted(OrchestrationError::Validator(e)),
        };

        match outcome {
            ValidationOutcome::Accepted(source) => {
                info!(attempt, %kind, "Candidate accepted");
                RunState::Succeeded(CompiledGuideline {
                    source,
                    attempts: attempt,
                })
            }
            ValidationOutcome::Rejected(latest) => {
                warn!(attempt, %kind, failures = latest.len(), "Candidate rejected");
                for failure in &latest {
                    warn!("  {}", failure);
                }

                if attempt >= self.config.max_attempts {
                    return RunState::Exhausted(OrchestrationError::Exhausted {
                        attempts: attempt,
                        failures: latest,
                    });
                }

                let failures = match self.config.failure_carry {
                    FailureCarry::Replace => latest,
                    FailureCarry::Accumulate => {
                        let mut all = failures;
                        all.extend(latest);
                        all
                    }
                };
                RunState::Attempting {
                    depth: attempt,
                    failures,
                }
            }
        }
    }
}
