//! Orchestrator configuration
//!
//! Attempt budget, allowed top-level kinds and failure carry-over policy.
//! Loaded from YAML or from environment variables:
//!
//! ```yaml
//! max_attempts: 3
//! allowed_kinds: [AllOf, If, ComparisonConstraint, OneOf, TaskConstraint]
//! failure_carry: replace
//! ```

use std::path::Path;

use constraint_core::NodeKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default attempt budget for one orchestration run
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Kinds a generator may return as the top-level candidate
///
/// MaintainRatioConstraint is left out: it only appears nested inside a task.
pub const DEFAULT_ALLOWED_KINDS: [NodeKind; 5] = [
    NodeKind::AllOf,
    NodeKind::If,
    NodeKind::ComparisonConstraint,
    NodeKind::OneOf,
    NodeKind::TaskConstraint,
];

/// How failures from earlier rounds reach the next generator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCarry {
    /// Only the latest round's failures
    #[default]
    Replace,
    /// Every failure seen so far in this run
    Accumulate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("allowed_kinds must not be empty")]
    NoAllowedKinds,

    #[error("{0} is not a constraint kind and cannot be a top-level candidate")]
    NotAConstraint(NodeKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_attempts: usize,
    pub allowed_kinds: Vec<NodeKind>,
    pub failure_carry: FailureCarry,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            allowed_kinds: DEFAULT_ALLOWED_KINDS.to_vec(),
            failure_carry: FailureCarry::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults overridden by GUIDELINE_MAX_ATTEMPTS and GUIDELINE_FAILURE_CARRY
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("GUIDELINE_MAX_ATTEMPTS") {
            config.max_attempts = value.trim().parse().map_err(|_| ConfigError::Env {
                var: "GUIDELINE_MAX_ATTEMPTS",
                value: value.clone(),
            })?;
        }

        if let Ok(value) = std::env::var("GUIDELINE_FAILURE_CARRY") {
            config.failure_carry = match value.trim().to_lowercase().as_str() {
                "replace" => FailureCarry::Replace,
                "accumulate" => FailureCarry::Accumulate,
                _ => {
                    return Err(ConfigError::Env {
                        var: "GUIDELINE_FAILURE_CARRY",
                        value,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.allowed_kinds.is_empty() {
            return Err(ConfigError::NoAllowedKinds);
        }
        if let Some(kind) = self.allowed_kinds.iter().find(|k| !k.is_constraint()) {
            return Err(ConfigError::NotAConstraint(*kind));
        }
        Ok(())
    }

    pub fn allows(&self, kind: NodeKind) -> bool {
        self.allowed_kinds.contains(&kind)
    }
}
