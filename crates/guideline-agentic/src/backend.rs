//! Backend Selection
//!
//! Enum for selecting between LLM providers (Anthropic, OpenAI).

use std::fmt;
use std::str::FromStr;

/// LLM backend provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    /// Anthropic Claude (default)
    #[default]
    Anthropic,
    /// OpenAI GPT
    OpenAi,
}

/// Error type for parsing LlmBackend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown GUIDELINE_BACKEND '{0}'. Valid values: anthropic, claude, openai, gpt")]
pub struct ParseBackendError(String);

impl LlmBackend {
    /// Read GUIDELINE_BACKEND, defaulting to Anthropic when unset
    pub fn from_env() -> Result<Self, ParseBackendError> {
        match std::env::var("GUIDELINE_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(LlmBackend::default()),
        }
    }

    /// Environment variable holding this backend's API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Environment variable overriding this backend's model
    pub fn model_var(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "ANTHROPIC_MODEL",
            LlmBackend::OpenAi => "OPENAI_MODEL",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmBackend::Anthropic => "Anthropic",
            LlmBackend::OpenAi => "OpenAI",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LlmBackend::Anthropic),
            "openai" | "gpt" => Ok(LlmBackend::OpenAi),
            other => Err(ParseBackendError(other.to_string())),
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("anthropic".parse::<LlmBackend>().unwrap(), LlmBackend::Anthropic);
        assert_eq!("Claude".parse::<LlmBackend>().unwrap(), LlmBackend::Anthropic);
        assert_eq!("openai".parse::<LlmBackend>().unwrap(), LlmBackend::OpenAi);
        assert_eq!("gpt".parse::<LlmBackend>().unwrap(), LlmBackend::OpenAi);
        let err = "bedrock".parse::<LlmBackend>().unwrap_err();
        assert!(err.to_string().contains("bedrock"));
    }

    #[test]
    fn test_env_vars() {
        assert_eq!(LlmBackend::OpenAi.api_key_var(), "OPENAI_API_KEY");
        assert_eq!(LlmBackend::default().model_var(), "ANTHROPIC_MODEL");
    }
}
