//! Constraint Generator
//!
//! Turns guideline text into a candidate constraint tree. The LLM-backed
//! generator shows the model the node grammar, the kinds allowed at the top
//! level, and whatever the validator rejected last time.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use constraint_core::{Constraint, Node, NodeKind, ValidationFailure};
use tracing::debug;

use crate::client_factory::create_llm_client;
use crate::llm_client::{extract_json, LlmClient};

#[async_trait]
pub trait ConstraintGenerator: Send + Sync {
    /// Produce one candidate; `prior_failures` is empty on the first attempt
    async fn generate(
        &self,
        raw_text: &str,
        allowed_kinds: &[NodeKind],
        prior_failures: &[ValidationFailure],
    ) -> Result<Constraint>;
}

/// Generator backed by a hosted language model
pub struct LlmConstraintGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmConstraintGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Client chosen from GUIDELINE_BACKEND and the provider key variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(create_llm_client()?))
    }

    fn build_user_prompt(
        raw_text: &str,
        allowed_kinds: &[NodeKind],
        prior_failures: &[ValidationFailure],
    ) -> String {
        let allowed = allowed_kinds
            .iter()
            .map(NodeKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let mut prompt = format!(
            "## Guideline text\n{}\n\n## Allowed top-level kinds\n{}\n",
            raw_text, allowed
        );

        if !prior_failures.is_empty() {
            prompt.push_str("\n## Your previous answer was rejected\n");
            for failure in prior_failures {
                let node = serde_json::to_string(&failure.node)
                    .unwrap_or_else(|_| failure.node.kind().to_string());
                let _ = writeln!(prompt, "- {}\n  node: {}", failure, node);
            }
            prompt.push_str("\nFix every problem above and answer again.\n");
        }

        prompt
    }

    fn parse_candidate(response: &str) -> Result<Constraint> {
        let json = extract_json(response);
        let node: Node = serde_json::from_str(json).map_err(|e| {
            anyhow!("Failed to parse generated node: {}\n\nJSON was:\n{}", e, json)
        })?;

        node.into_constraint()
            .map_err(|node| anyhow!("Generated node is a {}, not a rule", node.kind()))
    }
}

#[async_trait]
impl ConstraintGenerator for LlmConstraintGenerator {
    async fn generate(
        &self,
        raw_text: &str,
        allowed_kinds: &[NodeKind],
        prior_failures: &[ValidationFailure],
    ) -> Result<Constraint> {
        let system_prompt = include_str!("prompts/generate_system.md");
        let user_prompt = Self::build_user_prompt(raw_text, allowed_kinds, prior_failures);

        debug!(
            provider = self.client.provider_name(),
            model = self.client.model_name(),
            prior_failures = prior_failures.len(),
            "Requesting candidate"
        );

        let response = self.client.chat_json(system_prompt, &user_prompt).await?;
        Self::parse_candidate(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constraint_core::{FailureCode, NodePath, Variable};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays one canned response and records the prompts it was sent
    struct CannedClient {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.chat_json(system_prompt, user_prompt).await
        }

        async fn chat_json(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            Ok(self.response.clone())
        }

        fn model_name(&self) -> &str {
            "canned"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[test]
    fn test_first_prompt_has_no_feedback() {
        let prompt = LlmConstraintGenerator::build_user_prompt(
            "Minimum FICO 620",
            &[NodeKind::AllOf, NodeKind::ComparisonConstraint],
            &[],
        );
        assert_eq!(
            prompt,
            "## Guideline text\nMinimum FICO 620\n\n\
             ## Allowed top-level kinds\nAllOf, ComparisonConstraint\n"
        );
    }

    #[test]
    fn test_feedback_lists_failures() {
        let failure = ValidationFailure::new(
            FailureCode::InvalidIdentifier,
            NodePath::root().child("lhs"),
            Variable::new("fico score"),
            "'fico score' is not a valid identifier",
        );
        let prompt = LlmConstraintGenerator::build_user_prompt(
            "Minimum FICO 620",
            &[NodeKind::If],
            &[failure],
        );

        assert!(prompt.contains("## Your previous answer was rejected"));
        assert!(prompt.contains("[INVALID_IDENTIFIER] at root.lhs (Variable)"));
        assert!(prompt.contains(r#"node: {"typename":"Variable","name":"fico score"}"#));
    }

    #[test]
    fn test_parse_fenced_candidate() {
        let response = r#"```json
{"typename":"ComparisonConstraint",
 "lhs":{"typename":"Variable","name":"fico"},
 "operator":">=",
 "rhs":{"typename":"Value","type":"number","value":620}}
```"#;
        let candidate = LlmConstraintGenerator::parse_candidate(response).unwrap();
        assert_eq!(candidate.kind(), NodeKind::ComparisonConstraint);
    }

    #[test]
    fn test_operand_is_not_a_candidate() {
        let json = r#"{"typename":"Variable","name":"fico"}"#;
        let err = LlmConstraintGenerator::parse_candidate(json).unwrap_err();
        assert!(err.to_string().contains("Variable, not a rule"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(LlmConstraintGenerator::parse_candidate("I cannot help with that").is_err());
    }

    #[tokio::test]
    async fn test_generate_through_client() {
        let client = Arc::new(CannedClient::new(
            r#"{"typename":"TaskConstraint","root":{"name":"Loan"},"path":"$.out_of_pocket"}"#,
        ));
        let generator = LlmConstraintGenerator::new(client.clone());

        let candidate = generator
            .generate("borrower funds verified", &[NodeKind::TaskConstraint], &[])
            .await
            .unwrap();

        assert_eq!(candidate.kind(), NodeKind::TaskConstraint);
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("borrower funds verified"));
    }
}
