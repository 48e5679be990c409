//! OpenAI-compatible provider (vLLM wire protocol)
//!
//! Speaks `POST {base}/v1/chat/completions` with `{model, messages}` and
//! expects `{choices: [{message: {content}}], usage: {...}}`.

use super::{ChatMessage, ChatOptions, ChatReply, LlmProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Configuration for an OpenAI-compatible backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VllmConfig {
    /// Server URL, e.g. http://localhost:8000
    pub base_url: String,
    /// Models this server is expected to serve; first entry is the default
    pub models: Vec<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VllmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            models: vec!["mistral-7b-instruct".to_string()],
            timeout_secs: 30,
        }
    }
}

pub struct VllmProvider {
    config: VllmConfig,
    client: Client,
}

impl VllmProvider {
    pub const ID: &'static str = "vllm";

    pub fn new(config: VllmConfig) -> Self {
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
            .unwrap_or("mistral-7b-instruct")
    }

    fn build_body(&self, messages: &[ChatMessage], options: &ChatOptions) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let model = options
            .model
            .as_deref()
            .unwrap_or_else(|| self.default_model());

        json!({
            "model": model,
            "messages": wire_messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        })
    }

    /// Extract the normalized reply from a chat-completions payload
    pub(crate) fn parse_reply(raw: Value) -> Result<ChatReply, ProviderError> {
        let text = raw["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::malformed(Self::ID, "missing `choices[0].message.content`")
            })?;

        Ok(ChatReply { text, raw })
    }
}

#[async_trait]
impl LlmProvider for VllmProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "vLLM (chat completions)"
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
            .post(format!("{}/v1/chat/completions", self.config.base_url))
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
            .get(format!("{}/v1/models", self.config.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_chat_completion_reply() {
        let raw = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello, world!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        });
        let reply = VllmProvider::parse_reply(raw).unwrap();
        assert_eq!(reply.text, "Hello, world!");
        assert_eq!(reply.raw["usage"]["prompt_tokens"], 12);
    }

    #[test]
    fn empty_choices_is_provider_error() {
        let err = VllmProvider::parse_reply(json!({"choices": []})).unwrap_err();
        assert_eq!(err.provider, VllmProvider::ID);
        assert!(err.message.contains("choices"));
    }

    #[tokio::test]
    async fn http_500_normalizes_to_provider_error() {
        let base_url = crate::providers::testing::http_responder(
            crate::providers::testing::INTERNAL_ERROR,
        );
        let provider = VllmProvider::new(VllmConfig {
            base_url,
            timeout_secs: 5,
            ..Default::default()
        });

        let err = provider
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.provider, VllmProvider::ID);
        assert_eq!(err.status, Some(500));
    }

    #[test]
    fn body_uses_wire_roles() {
        let provider = VllmProvider::new(VllmConfig::default());
        let messages = vec![
            ChatMessage::system("You are a startup advisor."),
            ChatMessage::user("hi"),
            ChatMessage::assistant("Hello!"),
        ];
        let body = provider.build_body(&messages, &ChatOptions::default());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["model"], "mistral-7b-instruct");
    }
}
