//! Configuration management for the advisor core
//!
//! Supports configuration via:
//! 1. Config file (~/.config/advisor-core/config.toml)
//! 2. Environment variables (OLLAMA_URL, VLLM_URL, etc.)
//! 3. Programmatic overrides through [`ConfigBuilder`]
//!
//! LLM defaults are process-wide; per-agent overrides live in one table here
//! instead of being scattered across agent implementations.

use crate::agents::LlmSettings;
use crate::providers::{OllamaConfig, VllmConfig};
use crate::response::ShapingLimits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process-wide LLM defaults
    pub llm: LlmDefaults,

    /// Inference backends
    pub providers: ProviderSettings,

    /// Response shaping bounds
    pub shaping: ShapingLimits,

    /// Per-agent overrides of the LLM defaults, keyed by agent id
    pub agent_overrides: HashMap<String, AgentOverride>,
}

/// Process-wide LLM defaults injected into every agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmDefaults {
    /// Whether agents attempt the LLM path at all
    pub enabled: bool,

    /// Preferred provider id (ollama, vllm); empty means registration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Preferred model on the preferred provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Confidence reported for successful LLM answers
    pub confidence: f32,

    /// Conversation turns forwarded to the backend
    pub max_history: usize,
}

impl Default for LlmDefaults {
    fn default() -> Self {
        let settings = LlmSettings::default();
        Self {
            enabled: settings.enabled,
            provider: None,
            model: None,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            confidence: settings.confidence,
            max_history: settings.max_history,
        }
    }
}

/// Per-agent override; unset fields inherit the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOverride {
    pub enabled: Option<bool>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub ollama: OllamaSettings,
    pub vllm: VllmSettings,
}

/// Generate-style backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub enabled: bool,
    pub base_url: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        let config = OllamaConfig::default();
        Self {
            enabled: true,
            base_url: config.base_url,
            models: config.models,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl OllamaSettings {
    pub fn to_provider_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.base_url.clone(),
            models: self.models.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// OpenAI-compatible backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VllmSettings {
    pub enabled: bool,
    pub base_url: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for VllmSettings {
    fn default() -> Self {
        let config = VllmConfig::default();
        Self {
            enabled: true,
            base_url: config.base_url,
            models: config.models,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl VllmSettings {
    pub fn to_provider_config(&self) -> VllmConfig {
        VllmConfig {
            base_url: self.base_url.clone(),
            models: self.models.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("advisor-core")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path; a missing file yields defaults
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.providers.ollama.base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.providers.ollama.models = vec![model];
        }
        if let Ok(url) = std::env::var("VLLM_URL") {
            self.providers.vllm.base_url = url;
        }
        if let Ok(model) = std::env::var("VLLM_MODEL") {
            self.providers.vllm.models = vec![model];
        }
        if let Ok(provider) = std::env::var("ADVISOR_PROVIDER") {
            self.llm.provider = Some(provider);
        }
        self
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.enabled && !self.providers.ollama.enabled && !self.providers.vllm.enabled {
            return Err(ConfigError::Invalid(
                "LLM mode is enabled but no provider is; enable [providers.ollama] or [providers.vllm]"
                    .to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.confidence) {
            return Err(ConfigError::Invalid(format!(
                "llm.confidence must be in [0, 1], got {}",
                self.llm.confidence
            )));
        }
        Ok(())
    }

    /// Resolve the LLM settings for one agent: defaults plus any override
    pub fn llm_settings_for(&self, agent_id: &str) -> LlmSettings {
        let overrides = self.agent_overrides.get(agent_id);
        LlmSettings {
            enabled: overrides
                .and_then(|o| o.enabled)
                .unwrap_or(self.llm.enabled),
            provider: overrides
                .and_then(|o| o.provider.clone())
                .or_else(|| self.llm.provider.clone()),
            model: overrides
                .and_then(|o| o.model.clone())
                .or_else(|| self.llm.model.clone()),
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(self.llm.temperature),
            max_tokens: overrides
                .and_then(|o| o.max_tokens)
                .unwrap_or(self.llm.max_tokens),
            confidence: self.llm.confidence,
            max_history: self.llm.max_history,
        }
    }

    /// Generate example config content
    pub fn example() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.providers.ollama.base_url = url.into();
        self
    }

    pub fn ollama_model(mut self, model: impl Into<String>) -> Self {
        self.config.providers.ollama.models = vec![model.into()];
        self
    }

    pub fn vllm_url(mut self, url: impl Into<String>) -> Self {
        self.config.providers.vllm.base_url = url.into();
        self
    }

    pub fn preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.provider = Some(provider.into());
        self
    }

    pub fn llm_enabled(mut self, enabled: bool) -> Self {
        self.config.llm.enabled = enabled;
        self
    }

    pub fn agent_override(mut self, agent_id: impl Into<String>, value: AgentOverride) -> Self {
        self.config.agent_overrides.insert(agent_id.into(), value);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.enabled);
        assert_eq!(config.providers.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.providers.vllm.base_url, "http://localhost:8000");
        config.validate().unwrap();
    }

    #[test]
    fn test_agent_override_resolution() {
        let config = ConfigBuilder::new()
            .preferred_provider("ollama")
            .agent_override(
                "investment",
                AgentOverride {
                    model: Some("qwen2.5".to_string()),
                    temperature: Some(0.3),
                    ..Default::default()
                },
            )
            .build();

        let investment = config.llm_settings_for("investment");
        assert_eq!(investment.model.as_deref(), Some("qwen2.5"));
        assert_eq!(investment.temperature, 0.3);
        assert_eq!(investment.provider.as_deref(), Some("ollama"));

        let general = config.llm_settings_for("general");
        assert!(general.model.is_none());
        assert_eq!(general.temperature, LlmDefaults::default().temperature);
    }

    #[test]
    fn test_validation_rejects_llm_without_providers() {
        let mut config = Config::default();
        config.providers.ollama.enabled = false;
        config.providers.vllm.enabled = false;
        assert!(config.validate().is_err());

        config.llm.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_example_config_round_trips() {
        let example = Config::example();
        assert!(example.contains("[llm]"));
        assert!(example.contains("[providers.ollama]"));
        let parsed: Config = toml::from_str(&example).unwrap();
        parsed.validate().unwrap();
    }
}
