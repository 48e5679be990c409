//! Agents: specialty handlers with an LLM-first, template-fallback pipeline
//!
//! An agent encapsulates one domain specialty. Routing asks its pure
//! `can_handle` predicate; execution runs the layered pipeline: classify the
//! turn, attempt an LLM completion, substitute a deterministic template on any
//! provider failure, shape the result, and wrap it as a single
//! [`AgentMessage`]. Nothing in `process` propagates an error to the caller.

pub mod fallback;
pub mod message;
pub mod profiles;

pub use fallback::{FallbackEntry, FallbackError, FallbackTable};
pub use profiles::{AgentProfile, ProfileError};

use crate::agents::message::{
    AgentContext, AgentMessage, AgentResponse, ResponseMetadata, ResponseSource, Role,
};
use crate::providers::{ChatMessage, ChatOptions, ProviderError, ProviderRegistry};
use crate::response::{MessageType, ResponseController};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Text returned when even the deterministic fallback path fails
pub const EMERGENCY_CONTENT: &str =
    "I'm having trouble putting together a proper answer right now. Please try again in a moment.";

/// Confidence attached to the emergency one-liner
pub const EMERGENCY_CONFIDENCE: f32 = 0.7;

/// Degradation applied to template confidence so downstream consumers can
/// distinguish fallback answers from LLM answers
pub const FALLBACK_CONFIDENCE_PENALTY: f32 = 0.1;
pub const FALLBACK_CONFIDENCE_FLOOR: f32 = 0.6;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("agent `{0}` has no usable fallback content")]
    MissingFallback(String),
}

/// Static capability descriptor owned by each agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Unique process-wide id
    pub id: String,
    pub name: String,
    pub description: String,
    /// Specialty tags shown to the UI
    pub specialties: Vec<String>,
    /// Tool ids this agent may invoke
    pub tools: Vec<String>,
    /// Higher wins when several predicates match
    pub priority: u8,
}

/// Data-driven routing predicate: pure function of the message, no hidden
/// state. Specific agents gate on keywords and length; the catch-all accepts
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRule {
    pub keywords: Vec<String>,
    /// Messages shorter than this never match, so generic greetings stay with
    /// the general agent
    pub min_words: usize,
    pub catch_all: bool,
}

impl MatchRule {
    pub fn matches(&self, message: &str) -> bool {
        if self.catch_all {
            return true;
        }
        let trimmed = message.trim();
        if trimmed.split_whitespace().count() < self.min_words {
            return false;
        }
        let lower = trimmed.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// A specialty handler the orchestrator can route to
#[async_trait]
pub trait Agent: Send + Sync {
    fn capabilities(&self) -> &AgentCapabilities;

    /// Can this agent plausibly answer the message? Pure and side-effect free.
    fn can_handle(&self, message: &str) -> bool;

    /// Produce exactly one finalized message. Never fails; degraded answers
    /// are reported through metadata.
    async fn process(&self, message: &str, context: &AgentContext) -> AgentMessage;
}

/// Resolved LLM settings for one agent: process-wide defaults plus any
/// per-agent override from configuration
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub enabled: bool,
    /// Preferred provider id; the registry falls back past it when down
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Confidence reported for successful LLM answers
    pub confidence: f32,
    /// Conversation turns forwarded to the backend
    pub max_history: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: None,
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
            confidence: 0.92,
            max_history: 8,
        }
    }
}

/// The concrete agent used for every built-in profile: behavior comes from
/// data (capabilities, match rule, system prompt, fallback table), not from
/// per-specialty code.
pub struct SpecialistAgent {
    capabilities: AgentCapabilities,
    rule: MatchRule,
    system_prompt: String,
    fallback: FallbackTable,
    llm: LlmSettings,
    providers: Arc<ProviderRegistry>,
    controller: Arc<ResponseController>,
}

impl SpecialistAgent {
    pub fn new(
        capabilities: AgentCapabilities,
        rule: MatchRule,
        system_prompt: String,
        fallback: FallbackTable,
        llm: LlmSettings,
        providers: Arc<ProviderRegistry>,
        controller: Arc<ResponseController>,
    ) -> Self {
        Self {
            capabilities,
            rule,
            system_prompt,
            fallback,
            llm,
            providers,
            controller,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.rule.catch_all
    }

    /// One LLM completion for this turn: system prompt, recent history, then
    /// the user message.
    async fn generate_llm_response(
        &self,
        message: &str,
        context: &AgentContext,
    ) -> Result<String, ProviderError> {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];

        let start = context.history.len().saturating_sub(self.llm.max_history);
        for turn in &context.history[start..] {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(&turn.content),
                Role::Assistant => ChatMessage::assistant(&turn.content),
            });
        }
        messages.push(ChatMessage::user(message));

        let options = ChatOptions {
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        };

        let reply = self
            .providers
            .chat(&messages, &options, self.llm.provider.as_deref())
            .await?;
        Ok(reply.text)
    }

    /// Deterministic keyword-matched answer from the template table, with
    /// confidence degraded below any comparable LLM answer.
    fn fallback_response(&self, message: &str) -> Result<AgentResponse, AgentError> {
        let entry = self
            .fallback
            .lookup(message)
            .ok_or_else(|| AgentError::MissingFallback(self.capabilities.id.clone()))?;

        let confidence =
            (entry.confidence - FALLBACK_CONFIDENCE_PENALTY).max(FALLBACK_CONFIDENCE_FLOOR);

        Ok(AgentResponse {
            content: entry.content.clone(),
            confidence,
            attachments: entry.attachments.clone(),
            quick_actions: Vec::new(),
        })
    }

    async fn try_process(
        &self,
        message: &str,
        context: &AgentContext,
    ) -> Result<AgentMessage, AgentError> {
        let ctx = self.controller.analyze(message, &context.history);

        let (response, source, provider_error) = if self.llm.enabled {
            match self.generate_llm_response(message, context).await {
                Ok(text) => (
                    AgentResponse::text(text, self.llm.confidence),
                    ResponseSource::Llm,
                    None,
                ),
                Err(err) => {
                    warn!(
                        agent = %self.capabilities.id,
                        error = %err,
                        "LLM path failed, using template fallback"
                    );
                    (
                        self.fallback_response(message)?,
                        ResponseSource::Fallback,
                        Some(err.to_string()),
                    )
                }
            }
        } else {
            (self.fallback_response(message)?, ResponseSource::Fallback, None)
        };

        let shaped = self
            .controller
            .shape(&response.content, &ctx, response.attachments);

        Ok(AgentMessage {
            agent_id: self.capabilities.id.clone(),
            content: shaped.content,
            attachments: shaped.attachments,
            quick_actions: shaped.quick_actions,
            metadata: ResponseMetadata {
                confidence: response.confidence,
                message_type: ctx.message_type,
                source,
                error: provider_error,
            },
        })
    }

    fn emergency_message(&self, err: AgentError) -> AgentMessage {
        AgentMessage {
            agent_id: self.capabilities.id.clone(),
            content: EMERGENCY_CONTENT.to_string(),
            attachments: Vec::new(),
            quick_actions: Vec::new(),
            metadata: ResponseMetadata {
                confidence: EMERGENCY_CONFIDENCE,
                message_type: MessageType::SimpleQuestion,
                source: ResponseSource::Emergency,
                error: Some(err.to_string()),
            },
        }
    }
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn capabilities(&self) -> &AgentCapabilities {
        &self.capabilities
    }

    fn can_handle(&self, message: &str) -> bool {
        self.rule.matches(message)
    }

    async fn process(&self, message: &str, context: &AgentContext) -> AgentMessage {
        match self.try_process(message, context).await {
            Ok(msg) => msg,
            Err(err) => {
                error!(
                    agent = %self.capabilities.id,
                    error = %err,
                    "pipeline error, returning emergency message"
                );
                self.emergency_message(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::registry::tests::MockProvider;
    use crate::response::ShapingLimits;

    fn capabilities(id: &str, priority: u8) -> AgentCapabilities {
        AgentCapabilities {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            specialties: Vec::new(),
            tools: Vec::new(),
            priority,
        }
    }

    fn table(id: &str) -> FallbackTable {
        FallbackTable::new(
            id,
            vec![
                FallbackEntry {
                    tag: "funding".to_string(),
                    keywords: vec!["funding".to_string(), "raise".to_string()],
                    confidence: 0.9,
                    content: "Fundraising typically moves through preparation, outreach and \
                              diligence. Focus on traction metrics before approaching investors."
                        .to_string(),
                    attachments: Vec::new(),
                },
                FallbackEntry {
                    tag: "default".to_string(),
                    keywords: Vec::new(),
                    confidence: 0.8,
                    content: "Happy to help with strategy, fundraising or compliance questions."
                        .to_string(),
                    attachments: Vec::new(),
                },
            ],
        )
        .unwrap()
    }

    fn agent_with_provider(provider: MockProvider) -> SpecialistAgent {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(provider)).unwrap();
        SpecialistAgent::new(
            capabilities("investment", 5),
            MatchRule {
                keywords: vec!["funding".to_string()],
                min_words: 2,
                catch_all: false,
            },
            "You are an investment advisor.".to_string(),
            table("investment"),
            LlmSettings::default(),
            Arc::new(registry),
            Arc::new(ResponseController::new(ShapingLimits::default())),
        )
    }

    #[test]
    fn match_rule_gates_on_length_and_keywords() {
        let rule = MatchRule {
            keywords: vec!["funding".to_string()],
            min_words: 3,
            catch_all: false,
        };
        assert!(rule.matches("what about funding rounds"));
        assert!(!rule.matches("funding?")); // too short to steal from the catch-all
        assert!(!rule.matches("tell me about marketing plans"));
    }

    #[test]
    fn catch_all_rule_accepts_anything() {
        let rule = MatchRule {
            catch_all: true,
            ..Default::default()
        };
        assert!(rule.matches(""));
        assert!(rule.matches("anything at all"));
    }

    #[tokio::test]
    async fn llm_success_yields_undegraded_message() {
        let agent = agent_with_provider(MockProvider::succeeding("mock", "An LLM answer."));
        let ctx = AgentContext::new("s", "u");
        let msg = agent.process("How should I approach funding?", &ctx).await;

        assert_eq!(msg.metadata.source, ResponseSource::Llm);
        assert!(!msg.metadata.is_degraded());
        assert_eq!(msg.metadata.confidence, LlmSettings::default().confidence);
        assert_eq!(msg.content, "An LLM answer.");
        assert!(msg.metadata.error.is_none());
    }

    #[tokio::test]
    async fn provider_failure_falls_back_with_lower_confidence() {
        let agent = agent_with_provider(MockProvider::failing("mock"));
        let ctx = AgentContext::new("s", "u");
        let msg = agent.process("How should I approach funding?", &ctx).await;

        assert_eq!(msg.metadata.source, ResponseSource::Fallback);
        assert!(msg.metadata.is_degraded());
        assert!(msg.metadata.error.is_some());
        assert!(!msg.content.is_empty());
        // entry confidence 0.9, degraded by 0.1
        assert!((msg.metadata.confidence - 0.8).abs() < 1e-5);
        assert!(msg.metadata.confidence < LlmSettings::default().confidence);
        assert!(msg.metadata.confidence <= 0.85);
    }

    #[tokio::test]
    async fn fallback_confidence_is_floored() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::failing("mock")))
            .unwrap();
        let agent = SpecialistAgent::new(
            capabilities("x", 1),
            MatchRule::default(),
            String::new(),
            FallbackTable::new(
                "x",
                vec![FallbackEntry {
                    tag: "default".to_string(),
                    keywords: Vec::new(),
                    confidence: 0.62,
                    content: "Low-confidence canned answer.".to_string(),
                    attachments: Vec::new(),
                }],
            )
            .unwrap(),
            LlmSettings::default(),
            Arc::new(registry),
            Arc::new(ResponseController::default()),
        );

        let msg = agent.process("hello?", &AgentContext::new("s", "u")).await;
        assert!((msg.metadata.confidence - FALLBACK_CONFIDENCE_FLOOR).abs() < 1e-5);
    }

    #[tokio::test]
    async fn process_never_errors_even_on_empty_input() {
        let agent = agent_with_provider(MockProvider::failing("mock"));
        let msg = agent.process("", &AgentContext::new("s", "u")).await;
        assert!(!msg.content.is_empty());
    }

    #[tokio::test]
    async fn disabled_llm_goes_straight_to_templates() {
        let mut registry = ProviderRegistry::new();
        let provider = MockProvider::succeeding("mock", "should not be called");
        registry.register(Arc::new(provider)).unwrap();
        let agent = SpecialistAgent::new(
            capabilities("investment", 5),
            MatchRule::default(),
            String::new(),
            table("investment"),
            LlmSettings {
                enabled: false,
                ..Default::default()
            },
            Arc::new(registry),
            Arc::new(ResponseController::default()),
        );

        let msg = agent
            .process("How should I approach funding?", &AgentContext::new("s", "u"))
            .await;
        assert_eq!(msg.metadata.source, ResponseSource::Fallback);
        assert!(msg.metadata.error.is_none());
        assert!(msg.content.starts_with("Fundraising"));
    }
}
