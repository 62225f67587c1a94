//! Client Factory
//!
//! Builds the configured `LlmClient` behind an `Arc` so the generator and the
//! semantic oracle can share one connection pool.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::anthropic_client::AnthropicClient;
use crate::backend::LlmBackend;
use crate::llm_client::LlmClient;
use crate::openai_client::OpenAiClient;

/// Default per-request timeout for hosted model calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for one provider
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    /// Falls back to the provider default when `None`
    pub model: Option<String>,
    pub timeout: Duration,
}

impl LlmSettings {
    /// Read key and model for `backend`; timeout from GUIDELINE_LLM_TIMEOUT_SECS
    pub fn from_env(backend: LlmBackend) -> Result<Self> {
        let api_key = std::env::var(backend.api_key_var())
            .map_err(|_| anyhow!("{} environment variable not set", backend.api_key_var()))?;
        let model = std::env::var(backend.model_var()).ok();
        let timeout = match std::env::var("GUIDELINE_LLM_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|e| anyhow!("GUIDELINE_LLM_TIMEOUT_SECS '{}': {}", raw, e))?,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };
        Ok(Self {
            api_key,
            model,
            timeout,
        })
    }
}

/// Create a client for the backend named by GUIDELINE_BACKEND
pub fn create_llm_client() -> Result<Arc<dyn LlmClient>> {
    let backend = LlmBackend::from_env()?;
    let settings = LlmSettings::from_env(backend)?;
    create_llm_client_with(backend, settings)
}

/// Create a client for an explicit backend
pub fn create_llm_client_with(
    backend: LlmBackend,
    settings: LlmSettings,
) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match backend {
        LlmBackend::Anthropic => Arc::new(AnthropicClient::new(settings)?),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(settings)?),
    };
    info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "LLM client ready"
    );
    Ok(client)
}
