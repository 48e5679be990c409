//! Advisor core - message routing and response generation for the virtual advisor
//!
//! This library routes one chat turn to exactly one specialist agent and
//! returns one textual answer, degrading gracefully when inference backends
//! are unreachable.
//!
//! ## Key pieces
//!
//! - **Routing**: capability descriptors with pure predicates, priority
//!   matching and a guaranteed catch-all
//! - **Pipeline**: LLM-first generation with deterministic template fallback
//!   and an emergency envelope that never raises
//! - **Providers**: one interface over generate-style and OpenAI-compatible
//!   local inference servers, with health checks and failover
//! - **Response control**: deterministic turn classification and
//!   complexity-bound answer shaping

pub mod agents;
pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod response;
pub mod telemetry;
pub mod tui;

pub use agents::message::{
    AgentContext, AgentMessage, Attachment, AttachmentKind, ContextMetadata, ConversationTurn,
    QuickAction, ResponseMetadata, ResponseSource, Role,
};
pub use agents::{Agent, AgentCapabilities, LlmSettings, MatchRule, SpecialistAgent};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use orchestrator::{AgentRegistry, Orchestrator, RoutingError};
pub use providers::{
    ChatMessage, ChatOptions, ChatReply, LlmProvider, OllamaProvider, ProviderDescriptor,
    ProviderError, ProviderRegistry, ProviderStatus, VllmProvider,
};
pub use response::{MessageType, ResponseComplexity, ResponseContext, ResponseController};
pub use telemetry::{LogSink, TurnRecord, TurnSink, TurnTracker};
