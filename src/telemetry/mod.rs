//! Turn telemetry: in-process counters plus a best-effort sink hook
//!
//! The tracker counts what each pipeline layer produced. The [`TurnSink`]
//! trait is the seam for the external persistence/analytics collaborator: it
//! is invoked fire-and-forget, and the response contract never depends on it.

use crate::agents::message::{AgentMessage, ResponseSource};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// One completed chat turn, as handed to a sink
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub session_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub message_type: String,
    pub source: ResponseSource,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Best-effort "store this turn" collaborator. Implementations must not
/// assume they run to completion before the response is returned.
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn record(&self, record: TurnRecord);
}

/// Default sink: structured log line per turn
pub struct LogSink;

#[async_trait]
impl TurnSink for LogSink {
    async fn record(&self, record: TurnRecord) {
        info!(
            session = %record.session_id,
            agent = %record.agent_id,
            message_type = %record.message_type,
            source = ?record.source,
            confidence = record.confidence,
            "turn completed"
        );
    }
}

#[derive(Debug, Clone, Default)]
struct TurnCounters {
    turns: u64,
    llm_answers: u64,
    fallback_answers: u64,
    emergencies: u64,
    per_agent: HashMap<String, u64>,
}

/// Thread-safe counters for completed turns
#[derive(Clone, Default)]
pub struct TurnTracker {
    inner: Arc<Mutex<TurnCounters>>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: &AgentMessage) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.turns += 1;
            match message.metadata.source {
                ResponseSource::Llm => counters.llm_answers += 1,
                ResponseSource::Fallback => counters.fallback_answers += 1,
                ResponseSource::Emergency => counters.emergencies += 1,
            }
            *counters
                .per_agent
                .entry(message.agent_id.clone())
                .or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> TurnSummary {
        let counters = self
            .inner
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default();
        TurnSummary {
            turns: counters.turns,
            llm_answers: counters.llm_answers,
            fallback_answers: counters.fallback_answers,
            emergencies: counters.emergencies,
            per_agent: counters.per_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnSummary {
    pub turns: u64,
    pub llm_answers: u64,
    pub fallback_answers: u64,
    pub emergencies: u64,
    pub per_agent: HashMap<String, u64>,
}

impl std::fmt::Display for TurnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Advisor Turn Summary ===")?;
        writeln!(f, "Turns: {}", self.turns)?;
        writeln!(f, "LLM answers: {}", self.llm_answers)?;
        writeln!(f, "Fallback answers: {}", self.fallback_answers)?;
        writeln!(f, "Emergencies: {}", self.emergencies)?;
        let mut agents: Vec<_> = self.per_agent.iter().collect();
        agents.sort();
        for (agent, count) in agents {
            writeln!(f, "  {agent}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::message::ResponseMetadata;
    use crate::response::MessageType;

    fn message(source: ResponseSource) -> AgentMessage {
        AgentMessage {
            agent_id: "general".to_string(),
            content: "hi".to_string(),
            attachments: Vec::new(),
            quick_actions: Vec::new(),
            metadata: ResponseMetadata {
                confidence: 0.9,
                message_type: MessageType::Greeting,
                source,
                error: None,
            },
        }
    }

    #[test]
    fn tracker_counts_by_source() {
        let tracker = TurnTracker::new();
        tracker.record(&message(ResponseSource::Llm));
        tracker.record(&message(ResponseSource::Fallback));
        tracker.record(&message(ResponseSource::Fallback));
        tracker.record(&message(ResponseSource::Emergency));

        let summary = tracker.summary();
        assert_eq!(summary.turns, 4);
        assert_eq!(summary.llm_answers, 1);
        assert_eq!(summary.fallback_answers, 2);
        assert_eq!(summary.emergencies, 1);
        assert_eq!(summary.per_agent.get("general"), Some(&4));
    }
}
