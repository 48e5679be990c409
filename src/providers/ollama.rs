//! Generate-style provider (Ollama wire protocol)
//!
//! Speaks `POST {base}/api/generate` with `{model, prompt}` and expects
//! `{response: string, done: bool, ...}`. The conversation is flattened into a
//! single prompt because the generate endpoint is single-turn.

use super::{ChatMessage, ChatOptions, ChatReply, ChatRole, LlmProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Configuration for a generate-style backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server URL, e.g. http://localhost:11434
    pub base_url: String,
    /// Models this server is expected to serve; first entry is the default
    pub models: Vec<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            models: vec!["llama3.2".to_string()],
            timeout_secs: 30,
        }
    }
}

pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    pub const ID: &'static str = "ollama";

    pub fn new(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    fn default_model(&self) -> &str {
        self.config
            .models
            .first()
            .map(String::as_str)
            .unwrap_or("llama3.2")
    }

    /// Flatten system prompt and turns into the single-turn prompt the
    /// generate endpoint expects. The system message rides in the dedicated
    /// `system` field when present.
    fn build_body(&self, messages: &[ChatMessage], options: &ChatOptions) -> Value {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut prompt = String::new();
        for msg in messages.iter().filter(|m| m.role != ChatRole::System) {
            match msg.role {
                ChatRole::User => {
                    prompt.push_str("User: ");
                    prompt.push_str(&msg.content);
                    prompt.push('\n');
                }
                ChatRole::Assistant => {
                    prompt.push_str("Advisor: ");
                    prompt.push_str(&msg.content);
                    prompt.push('\n');
                }
                ChatRole::System => {}
            }
        }
        prompt.push_str("Advisor:");

        let model = options
            .model
            .as_deref()
            .unwrap_or_else(|| self.default_model());

        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
            }
        });

        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }

        body
    }

    /// Extract the normalized reply from a generate-style payload
    pub(crate) fn parse_reply(raw: Value) -> Result<ChatReply, ProviderError> {
        let text = raw["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::malformed_field("response"))?;

        if !raw["done"].as_bool().unwrap_or(false) {
            return Err(ProviderError::malformed(
                Self::ID,
                "generation did not complete (done=false)",
            ));
        }

        Ok(ChatReply { text, raw })
    }

    fn malformed_field(field: &str) -> ProviderError {
        ProviderError::malformed(Self::ID, format!("missing `{field}` field"))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Ollama (generate)"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn models(&self) -> &[String] {
        &self.config.models
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, ProviderError> {
        let body = self.build_body(messages, options);

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(Self::ID, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(Self::ID, status.as_u16(), text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(Self::ID, e.to_string()))?;

        Self::parse_reply(raw)
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.config.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
