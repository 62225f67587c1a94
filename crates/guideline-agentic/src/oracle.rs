//! Semantic Oracle
//!
//! Re-reads the source rule text next to the compiled program and reports
//! whether they say the same thing.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::llm_client::{extract_json, LlmClient};

/// Oracle verdict on one compiled candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Agree,
    Disagree { reason: String },
}

#[async_trait]
pub trait SemanticOracle: Send + Sync {
    async fn check(&self, raw_text: &str, compiled: &str) -> Result<Verdict>;
}

/// Oracle that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughOracle;

#[async_trait]
impl SemanticOracle for PassThroughOracle {
    async fn check(&self, _raw_text: &str, _compiled: &str) -> Result<Verdict> {
        Ok(Verdict::Agree)
    }
}

#[derive(Debug, Deserialize)]
struct OracleReply {
    agree: bool,
    #[serde(default)]
    reason: String,
}

/// Oracle backed by a hosted language model
pub struct LlmSemanticOracle {
    client: Arc<dyn LlmClient>,
}

impl LlmSemanticOracle {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn parse_reply(response: &str) -> Result<Verdict> {
        let json = extract_json(response);
        let reply: OracleReply = serde_json::from_str(json)
            .map_err(|e| anyhow!("Failed to parse oracle reply: {}\n\nJSON was:\n{}", e, json))?;

        if reply.agree {
            Ok(Verdict::Agree)
        } else if reply.reason.trim().is_empty() {
            Ok(Verdict::Disagree {
                reason: "compiled rule does not match the guideline text".to_string(),
            })
        } else {
            Ok(Verdict::Disagree {
                reason: reply.reason,
            })
        }
    }
}

#[async_trait]
impl SemanticOracle for LlmSemanticOracle {
    async fn check(&self, raw_text: &str, compiled: &str) -> Result<Verdict> {
        let system_prompt = include_str!("prompts/semantic_check_system.md");
        let user_prompt = format!(
            "## Guideline text\n{}\n\n## Compiled rule\n```\n{}\n```",
            raw_text, compiled
        );

        let response = self.client.chat_json(system_prompt, &user_prompt).await?;
        let verdict = Self::parse_reply(&response)?;
        debug!(
            provider = self.client.provider_name(),
            agree = matches!(verdict, Verdict::Agree),
            "semantic check"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agree() {
        assert_eq!(
            LlmSemanticOracle::parse_reply(r#"{"agree": true}"#).unwrap(),
            Verdict::Agree
        );
    }

    #[test]
    fn test_parse_disagree_with_reason() {
        let reply = "```json\n{\"agree\": false, \"reason\": \"threshold is 620, not 580\"}\n```";
        assert_eq!(
            LlmSemanticOracle::parse_reply(reply).unwrap(),
            Verdict::Disagree {
                reason: "threshold is 620, not 580".to_string()
            }
        );
    }

    #[test]
    fn test_parse_disagree_without_reason() {
        match LlmSemanticOracle::parse_reply(r#"{"agree": false}"#).unwrap() {
            Verdict::Disagree { reason } => assert!(!reason.is_empty()),
            Verdict::Agree => panic!("expected disagreement"),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(LlmSemanticOracle::parse_reply("looks fine to me").is_err());
    }

    #[tokio::test]
    async fn test_pass_through() {
        let verdict = PassThroughOracle.check("anything", "dsl.allOf()").await.unwrap();
        assert_eq!(verdict, Verdict::Agree);
    }
}
