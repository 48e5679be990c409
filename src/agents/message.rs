//! Value types flowing through the agent pipeline

use crate::response::MessageType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Who authored a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior turn supplied by the caller; read-only to the core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Agent that produced an assistant turn, when known
    pub agent_id: Option<String>,
    #[serde(skip)]
    pub timestamp: Option<Instant>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            agent_id: None,
            timestamp: Some(Instant::now()),
        }
    }

    pub fn assistant(content: impl Into<String>, agent_id: Option<&str>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            agent_id: agent_id.map(str::to_string),
            timestamp: Some(Instant::now()),
        }
    }
}

/// Caller-supplied routing hints and channel info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextMetadata {
    /// When set to a registered agent id, routing honors it unconditionally
    pub preferred_agent: Option<String>,
    /// Originating channel (web, widget, api)
    pub channel: Option<String>,
    /// Open bag for anything the caller wants to pass through
    pub extra: HashMap<String, String>,
}

/// Per-invocation context, constructed fresh for every incoming message.
/// The core never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub session_id: String,
    pub user_id: String,
    #[serde(skip)]
    pub received_at: Option<Instant>,
    pub history: Vec<ConversationTurn>,
    pub metadata: ContextMetadata,
}

impl AgentContext {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            received_at: Some(Instant::now()),
            history: Vec::new(),
            metadata: ContextMetadata::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_preferred_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.metadata.preferred_agent = Some(agent_id.into());
        self
    }
}

/// Fixed vocabulary of attachment types the UI can render. New kinds are added
/// here, never invented ad hoc by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Link,
    Document,
    Checklist,
    Calculator,
    Resource,
}

/// Structured pointer bundled with a textual answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
}

impl Attachment {
    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Link,
            title: title.into(),
            url: Some(url.into()),
            description: None,
            items: None,
        }
    }

    pub fn document(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Document,
            title: title.into(),
            url: None,
            description: Some(description.into()),
            items: None,
        }
    }

    pub fn checklist(title: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            kind: AttachmentKind::Checklist,
            title: title.into(),
            url: None,
            description: None,
            items: Some(items),
        }
    }
}

/// Suggested quick action the UI may render as a chip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// An agent's raw output before shaping
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: String,
    /// In [0, 1]; fallback answers score strictly below LLM answers
    pub confidence: f32,
    pub attachments: Vec<Attachment>,
    pub quick_actions: Vec<QuickAction>,
}

impl AgentResponse {
    pub fn text(content: impl Into<String>, confidence: f32) -> Self {
        Self {
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            attachments: Vec::new(),
            quick_actions: Vec::new(),
        }
    }
}

/// Which layer of the fallback chain produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Llm,
    Fallback,
    Emergency,
}

/// Metadata attached to the finalized message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub confidence: f32,
    pub message_type: MessageType,
    pub source: ResponseSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseMetadata {
    /// Anything below the LLM layer is a degraded answer
    pub fn is_degraded(&self) -> bool {
        self.source != ResponseSource::Llm
    }
}

/// The finalized, caller-facing result. Exactly one is produced per incoming
/// message and it is immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    pub agent_id: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub quick_actions: Vec<QuickAction>,
    pub metadata: ResponseMetadata,
}
