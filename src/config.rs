//! Orchestrator configuration
//!
//! One explicit record handed to `Orchestrator::bootstrap`. Every field has a
//! default so a config file only needs to name what it changes.

use crate::error::OrchestrationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Refinement stops once an evaluation reaches this score.
    pub confidence_threshold: u8,
    /// Attempts the prompt refiner gets before settling.
    pub max_refinement_attempts: usize,
    /// Critique rounds a refinement controller may run.
    pub max_confidence_iterations: usize,
    /// Domain tag → role names that must never join the roster.
    pub domain_exclusions: HashMap<String, Vec<String>>,
    pub gateway: GatewayConfig,
    pub team: TeamConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    pub managers: usize,
    pub individuals: usize,
    pub routing_seed: u64,
    pub refine_subtask_results: bool,
    pub fallback_subtasks: Vec<String>,
    /// Role name → template override.
    pub role_templates: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub python: String,
    pub shell: String,
    pub blocked_patterns: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 85,
            max_refinement_attempts: 4,
            max_confidence_iterations: 5,
            domain_exclusions: HashMap::new(),
            gateway: GatewayConfig::default(),
            team: TeamConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            temperature: 0.1,
            timeout_secs: 120,
        }
    }
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            managers: 3,
            individuals: 6,
            routing_seed: 42,
            refine_subtask_results: true,
            fallback_subtasks: vec![
                "Research the background and constraints of the goal".to_string(),
                "Analyze the options available for reaching the goal".to_string(),
                "Summarize findings and recommend next steps".to_string(),
            ],
            role_templates: HashMap::new(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            python: "python3".to_string(),
            shell: "sh".to_string(),
            blocked_patterns: vec![
                "rm -rf /".to_string(),
                "rm -rf ~".to_string(),
                "mkfs".to_string(),
                "dd if=/dev".to_string(),
                ":(){ :|:& };:".to_string(),
                "shutdown".to_string(),
                "reboot".to_string(),
                "> /dev/sda".to_string(),
            ],
        }
    }
}

impl OrchestratorConfig {
    /// Load from a TOML file. A missing file is fatal.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OrchestrationError::ConfigNotFound(path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(path)?;
        let config: OrchestratorConfig = toml::from_str(&raw)?;
        config.validate()?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load from file, then apply `.env` and process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("ORCHESTRATOR_MODEL") {
            self.gateway.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.gateway.base_url = url;
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.gateway.api_key = Some(key);
            }
        }
        if let Some(provider) = lookup("ORCHESTRATOR_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "gemini" => self.gateway.provider = Provider::Gemini,
                "ollama" => self.gateway.provider = Provider::Ollama,
                other => tracing::warn!(provider = other, "Unknown provider override ignored"),
            }
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.confidence_threshold > 100 {
            return Err(OrchestrationError::InvalidConfig(format!(
                "confidence_threshold must be within 0..=100, got {}",
                self.confidence_threshold
            )));
        }
        if self.max_confidence_iterations == 0 {
            return Err(OrchestrationError::InvalidConfig(
                "max_confidence_iterations must be at least 1".to_string(),
            ));
        }
        if self.team.fallback_subtasks.is_empty() {
            return Err(OrchestrationError::InvalidConfig(
                "team.fallback_subtasks must not be empty".to_string(),
            ));
        }
        if self.gateway.timeout_secs == 0 || self.execution.timeout_secs == 0 {
            return Err(OrchestrationError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
