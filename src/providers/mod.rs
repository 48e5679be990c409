//! LLM provider abstraction for local inference backends
//!
//! Two wire protocols are supported: a generate-style API (Ollama) and an
//! OpenAI-compatible chat-completions API (vLLM and friends). Both map to the
//! same normalized reply shape, and every failure mode collapses into a single
//! [`ProviderError`] so the agent pipeline has exactly one fallback trigger.

mod ollama;
pub(crate) mod registry;
mod vllm;

pub use ollama::{OllamaConfig, OllamaProvider};
pub use registry::{ProviderDescriptor, ProviderRegistry, ProviderStatus};
pub use vllm::{VllmConfig, VllmProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized provider failure: network errors, timeouts, non-2xx statuses and
/// malformed replies all land here. The original status/message is preserved
/// for logging; callers treat every instance identically.
#[derive(Error, Debug, Clone)]
#[error("provider {provider}: {message}")]
pub struct ProviderError {
    /// Id of the provider that failed (or "registry" for selection failures)
    pub provider: String,
    /// HTTP status, when the backend answered at all
    pub status: Option<u16>,
    /// Human-readable description of what went wrong
    pub message: String,
}

impl ProviderError {
    pub fn http(provider: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn network(provider: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            format!("request failed: {err}")
        };
        Self {
            provider: provider.to_string(),
            status: None,
            message,
        }
    }

    pub fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            status: None,
            message: format!("malformed reply: {}", detail.into()),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            provider: "registry".to_string(),
            status: None,
            message: detail.into(),
        }
    }
}

/// A single turn handed to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Generation knobs forwarded to the backend
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model id; providers fall back to their configured default when empty
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Normalized completion: the extracted text plus the untouched backend payload
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub raw: serde_json::Value,
}

/// Uniform interface over heterogeneous local inference servers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable id used in configuration and routing preferences
    fn id(&self) -> &str;

    /// Human-readable name for logs and the `health` command
    fn name(&self) -> &str;

    /// Base endpoint, for the registry's descriptor snapshot
    fn base_url(&self) -> &str;

    /// Model ids this provider is configured to serve
    fn models(&self) -> &[String];

    /// One completion for one serialized conversation
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatReply, ProviderError>;

    /// Lightweight reachability probe
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// One-shot HTTP responder: accepts a single connection, reads the full
    /// request, writes the canned response and closes. Returns the base URL.
    pub(crate) fn http_responder(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener addr");
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request_complete(&request) {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    pub(crate) const INTERNAL_ERROR: &str =
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\nboom";

    fn request_complete(raw: &[u8]) -> bool {
        let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&raw[..split]).to_lowercase();
        let body_len = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + body_len
    }
}
