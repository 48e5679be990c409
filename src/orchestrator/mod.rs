//! Orchestrator: agent registry, routing, and the single entry point
//!
//! Routing is a two-stage filter: every registered agent's `can_handle`
//! predicate runs against the message, and among the matches the highest
//! priority wins, with registration order breaking ties. A mandatory
//! catch-all agent guarantees routing never fails at runtime; a registry
//! without one is a configuration error that aborts startup.

use crate::agents::message::{AgentContext, AgentMessage};
use crate::agents::profiles::{build_agent, builtin_profiles};
use crate::agents::{Agent, AgentCapabilities, ProfileError};
use crate::config::Config;
use crate::providers::{
    OllamaProvider, ProviderError, ProviderRegistry, VllmProvider,
};
use crate::response::ResponseController;
use crate::telemetry::{LogSink, TurnRecord, TurnSink, TurnTracker};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Startup-only failures. Routing itself cannot fail once an orchestrator
/// exists.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("agent id `{0}` already registered")]
    DuplicateAgent(String),

    #[error("no agents registered")]
    NoAgents,

    #[error("no catch-all agent registered; routing could fail at runtime")]
    NoCatchAll,

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Registration-ordered agent set
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<(), RoutingError> {
        let id = agent.capabilities().id.clone();
        if self.agents.iter().any(|a| a.capabilities().id == id) {
            return Err(RoutingError::DuplicateAgent(id));
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.capabilities().id == id)
    }

    pub fn capabilities(&self) -> Vec<AgentCapabilities> {
        self.agents.iter().map(|a| a.capabilities().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Pick exactly one agent for the message. The preferred-agent override
    /// wins when it names a registered id; otherwise the highest-priority
    /// matching predicate wins, first registered on ties.
    pub fn route(&self, message: &str, context: &AgentContext) -> Option<&Arc<dyn Agent>> {
        if let Some(preferred) = context.metadata.preferred_agent.as_deref() {
            match self.get(preferred) {
                Some(agent) => return Some(agent),
                None => {
                    debug!(agent = preferred, "preferred agent not registered, routing normally")
                }
            }
        }

        let mut best: Option<&Arc<dyn Agent>> = None;
        for agent in &self.agents {
            if !agent.can_handle(message) {
                continue;
            }
            // Strictly-greater keeps the first registered agent on priority ties
            let better = match best {
                Some(current) => {
                    agent.capabilities().priority > current.capabilities().priority
                }
                None => true,
            };
            if better {
                best = Some(agent);
            }
        }
        best
    }
}

/// Owns the agent registry and returns exactly one [`AgentMessage`] per
/// incoming user message.
pub struct Orchestrator {
    agents: AgentRegistry,
    providers: Arc<ProviderRegistry>,
    tracker: TurnTracker,
    sink: Arc<dyn TurnSink>,
}

impl Orchestrator {
    /// Validate the registry and take ownership. Fails fast on an empty
    /// registry or one without a catch-all; that is a deployment mistake, not
    /// a per-message condition.
    pub fn new(
        agents: AgentRegistry,
        providers: Arc<ProviderRegistry>,
    ) -> Result<Self, RoutingError> {
        if agents.is_empty() {
            return Err(RoutingError::NoAgents);
        }
        // A catch-all must accept anything, including an empty message
        if !agents.agents.iter().any(|a| a.can_handle("")) {
            return Err(RoutingError::NoCatchAll);
        }
        Ok(Self {
            agents,
            providers,
            tracker: TurnTracker::new(),
            sink: Arc::new(LogSink),
        })
    }

    /// Swap the best-effort turn collaborator
    pub fn with_sink(mut self, sink: Arc<dyn TurnSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the standard advisor: built-in profiles over the configured
    /// providers.
    pub fn from_config(config: &Config) -> Result<Self, RoutingError> {
        let mut providers = ProviderRegistry::new();
        if config.providers.ollama.enabled {
            providers.register(Arc::new(OllamaProvider::new(
                config.providers.ollama.to_provider_config(),
            )))?;
        }
        if config.providers.vllm.enabled {
            providers.register(Arc::new(VllmProvider::new(
                config.providers.vllm.to_provider_config(),
            )))?;
        }
        let providers = Arc::new(providers);
        let controller = Arc::new(ResponseController::new(config.shaping.clone()));

        let mut registry = AgentRegistry::new();
        for profile in builtin_profiles()? {
            let llm = config.llm_settings_for(&profile.id);
            let agent = build_agent(&profile, llm, providers.clone(), controller.clone())?;
            registry.register(Arc::new(agent))?;
        }

        Self::new(registry, providers)
    }

    /// The one entry point the chat UI needs. Never fails; degradation is
    /// reported through the message metadata.
    pub async fn process_message(&self, text: &str, context: &AgentContext) -> AgentMessage {
        // The catch-all makes route infallible for a validated registry
        let agent = match self.agents.route(text, context) {
            Some(agent) => agent,
            None => self
                .agents
                .agents
                .first()
                .expect("validated registry is non-empty"),
        };
        debug!(agent = %agent.capabilities().id, "routed message");

        let message = agent.process(text, context).await;

        self.tracker.record(&message);
        let record = TurnRecord {
            session_id: context.session_id.clone(),
            user_id: context.user_id.clone(),
            agent_id: message.agent_id.clone(),
            message_type: message.metadata.message_type.as_str().to_string(),
            source: message.metadata.source,
            confidence: message.metadata.confidence,
            error: message.metadata.error.clone(),
        };
        let sink = self.sink.clone();
        tokio::spawn(async move { sink.record(record).await });

        message
    }

    pub fn capabilities(&self) -> Vec<AgentCapabilities> {
        self.agents.capabilities()
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn stats(&self) -> crate::telemetry::TurnSummary {
        self.tracker.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fallback::{FallbackEntry, FallbackTable};
    use crate::agents::{LlmSettings, MatchRule, SpecialistAgent};
    use crate::providers::registry::tests::MockProvider;
    use crate::response::MessageType;

    fn test_agent(
        id: &str,
        priority: u8,
        rule: MatchRule,
        providers: Arc<ProviderRegistry>,
    ) -> Arc<dyn Agent> {
        let capabilities = AgentCapabilities {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            specialties: Vec::new(),
            tools: Vec::new(),
            priority,
        };
        let table = FallbackTable::new(
            id,
            vec![FallbackEntry {
                tag: "default".to_string(),
                keywords: Vec::new(),
                confidence: 0.8,
                content: format!("Canned answer from {id}."),
                attachments: Vec::new(),
            }],
        )
        .unwrap();
        Arc::new(SpecialistAgent::new(
            capabilities,
            rule,
            String::new(),
            table,
            LlmSettings::default(),
            providers,
            Arc::new(ResponseController::default()),
        ))
    }

    fn keyword_rule(words: &[&str]) -> MatchRule {
        MatchRule {
            keywords: words.iter().map(|s| s.to_string()).collect(),
            min_words: 0,
            catch_all: false,
        }
    }

    fn failing_providers() -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::failing("mock")))
            .unwrap();
        Arc::new(registry)
    }

    fn build_orchestrator() -> Orchestrator {
        let providers = failing_providers();
        let mut registry = AgentRegistry::new();
        registry
            .register(test_agent(
                "general",
                0,
                MatchRule {
                    catch_all: true,
                    ..Default::default()
                },
                providers.clone(),
            ))
            .unwrap();
        registry
            .register(test_agent(
                "investment",
                8,
                keyword_rule(&["funding", "invest"]),
                providers.clone(),
            ))
            .unwrap();
        registry
            .register(test_agent(
                "strategy",
                6,
                keyword_rule(&["funding", "strategy"]),
                providers.clone(),
            ))
            .unwrap();
        Orchestrator::new(registry, providers).unwrap()
    }

    #[test]
    fn duplicate_agent_id_is_rejected() {
        let providers = failing_providers();
        let mut registry = AgentRegistry::new();
        registry
            .register(test_agent("a", 0, MatchRule::default(), providers.clone()))
            .unwrap();
        let err = registry
            .register(test_agent("a", 1, MatchRule::default(), providers))
            .unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateAgent(_)));
    }

    #[test]
    fn empty_registry_fails_at_startup() {
        let err = Orchestrator::new(AgentRegistry::new(), failing_providers())
            .err()
            .unwrap();
        assert!(matches!(err, RoutingError::NoAgents));
    }

    #[test]
    fn registry_without_catch_all_fails_at_startup() {
        let providers = failing_providers();
        let mut registry = AgentRegistry::new();
        registry
            .register(test_agent(
                "investment",
                8,
                keyword_rule(&["funding"]),
                providers.clone(),
            ))
            .unwrap();
        let err = Orchestrator::new(registry, providers).err().unwrap();
        assert!(matches!(err, RoutingError::NoCatchAll));
    }

    #[test]
    fn routing_always_resolves_with_catch_all() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u");
        for message in ["", "hi", "completely unrelated gibberish xyzzy"] {
            let agent = orchestrator.agents.route(message, &ctx).unwrap();
            assert_eq!(agent.capabilities().id, "general");
        }
    }

    #[test]
    fn overlapping_predicates_resolve_by_priority() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u");
        // Both investment (8) and strategy (6) match "funding"
        let agent = orchestrator.agents.route("funding question", &ctx).unwrap();
        assert_eq!(agent.capabilities().id, "investment");
    }

    #[test]
    fn priority_ties_break_by_registration_order() {
        let providers = failing_providers();
        let mut registry = AgentRegistry::new();
        registry
            .register(test_agent(
                "general",
                0,
                MatchRule {
                    catch_all: true,
                    ..Default::default()
                },
                providers.clone(),
            ))
            .unwrap();
        registry
            .register(test_agent("first", 5, keyword_rule(&["tax"]), providers.clone()))
            .unwrap();
        registry
            .register(test_agent("second", 5, keyword_rule(&["tax"]), providers.clone()))
            .unwrap();
        let orchestrator = Orchestrator::new(registry, providers).unwrap();

        let ctx = AgentContext::new("s", "u");
        let agent = orchestrator.agents.route("tax question", &ctx).unwrap();
        assert_eq!(agent.capabilities().id, "first");
    }

    #[test]
    fn preferred_agent_override_ignores_predicates() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u").with_preferred_agent("investment");
        // "hi" would never match the investment predicate
        let agent = orchestrator.agents.route("hi", &ctx).unwrap();
        assert_eq!(agent.capabilities().id, "investment");
    }

    #[test]
    fn unknown_preferred_agent_falls_back_to_normal_routing() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u").with_preferred_agent("nonexistent");
        let agent = orchestrator.agents.route("hi", &ctx).unwrap();
        assert_eq!(agent.capabilities().id, "general");
    }

    #[tokio::test]
    async fn process_message_returns_valid_message_for_any_input() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u");
        for message in ["", "hi", "What about funding?"] {
            let msg = orchestrator.process_message(message, &ctx).await;
            assert!(!msg.content.is_empty());
            assert!(!msg.agent_id.is_empty());
        }
        assert_eq!(orchestrator.stats().turns, 3);
    }

    #[tokio::test]
    async fn greeting_scenario_routes_to_general_with_short_reply() {
        let orchestrator = build_orchestrator();
        let ctx = AgentContext::new("s", "u");
        let msg = orchestrator.process_message("hi", &ctx).await;

        assert_eq!(msg.agent_id, "general");
        assert_eq!(msg.metadata.message_type, MessageType::Greeting);
        // Minimal shaping: at most two sentences, at most one link attachment
        let sentences = msg.content.matches(['.', '!', '?']).count();
        assert!(sentences <= 2);
        assert!(msg.attachments.len() <= 1);
    }
}
