//! Deterministic template fallback tables
//!
//! Each agent carries a lookup table keyed by detected sub-intent: a set of
//! keyword-triggered entries plus one default entry (empty keyword list). The
//! content lives in embedded TOML rather than code, so editing an answer never
//! touches the pipeline.

use crate::agents::message::Attachment;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("agent `{0}` has no default fallback entry (empty keyword list)")]
    MissingDefault(String),
    #[error("agent `{0}` has no fallback entries")]
    Empty(String),
}

/// One canned answer, triggered by any of its keywords
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackEntry {
    /// Sub-intent tag, e.g. "valuation" or "fundraising"
    pub tag: String,
    /// Trigger keywords; an empty list marks the default entry
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Tuning constant from the content file, degraded before use
    pub confidence: f32,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl FallbackEntry {
    fn matches(&self, lower_message: &str) -> bool {
        self.keywords.iter().any(|k| lower_message.contains(k.as_str()))
    }
}

/// Intent -> content lookup for one agent
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: Vec<FallbackEntry>,
}

impl FallbackTable {
    /// Build a validated table: at least one entry, with a default present
    pub fn new(agent_id: &str, entries: Vec<FallbackEntry>) -> Result<Self, FallbackError> {
        if entries.is_empty() {
            return Err(FallbackError::Empty(agent_id.to_string()));
        }
        if !entries.iter().any(|e| e.keywords.is_empty()) {
            return Err(FallbackError::MissingDefault(agent_id.to_string()));
        }
        Ok(Self { entries })
    }

    /// First keyword match in table order, else the default entry
    pub fn lookup(&self, message: &str) -> Option<&FallbackEntry> {
        let lower = message.to_lowercase();
        self.entries
            .iter()
            .find(|e| !e.keywords.is_empty() && e.matches(&lower))
            .or_else(|| self.entries.iter().find(|e| e.keywords.is_empty()))
    }

    pub fn entries(&self) -> &[FallbackEntry] {
        &self.entries
    }
}
