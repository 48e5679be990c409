//! Built-in advisor profiles
//!
//! Profiles are data: capability descriptor, routing rule, system prompt and
//! fallback table, shipped as embedded TOML and parsed once at startup. Code
//! never special-cases an individual specialty.

use crate::agents::fallback::{FallbackEntry, FallbackError, FallbackTable};
use crate::agents::{AgentCapabilities, LlmSettings, MatchRule, SpecialistAgent};
use crate::providers::ProviderRegistry;
use crate::response::ResponseController;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

const BUILTIN_PROFILES: &str = include_str!("../../content/profiles.toml");

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to parse profile data: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Fallback(#[from] FallbackError),

    #[error("duplicate agent id `{0}` in profile data")]
    DuplicateId(String),

    #[error("profile data contains no agents")]
    Empty,
}

/// One agent as declared in the profile data
#[derive(Debug, Clone, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    pub priority: u8,
    #[serde(default)]
    pub catch_all: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub min_words: usize,
    pub system_prompt: String,
    pub intents: Vec<FallbackEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    agents: Vec<AgentProfile>,
}

impl AgentProfile {
    pub fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            specialties: self.specialties.clone(),
            tools: self.tools.clone(),
            priority: self.priority,
        }
    }

    pub fn match_rule(&self) -> MatchRule {
        MatchRule {
            keywords: self.keywords.clone(),
            min_words: self.min_words,
            catch_all: self.catch_all,
        }
    }
}

/// Parse the embedded profile data, validating ids and fallback tables
pub fn builtin_profiles() -> Result<Vec<AgentProfile>, ProfileError> {
    parse_profiles(BUILTIN_PROFILES)
}

pub fn parse_profiles(data: &str) -> Result<Vec<AgentProfile>, ProfileError> {
    let file: ProfileFile = toml::from_str(data)?;
    if file.agents.is_empty() {
        return Err(ProfileError::Empty);
    }

    for (i, agent) in file.agents.iter().enumerate() {
        if file.agents[..i].iter().any(|a| a.id == agent.id) {
            return Err(ProfileError::DuplicateId(agent.id.clone()));
        }
        // Fail at parse time rather than first lookup
        FallbackTable::new(&agent.id, agent.intents.clone())?;
    }

    Ok(file.agents)
}

/// Instantiate one profile against shared infrastructure
pub fn build_agent(
    profile: &AgentProfile,
    llm: LlmSettings,
    providers: Arc<ProviderRegistry>,
    controller: Arc<ResponseController>,
) -> Result<SpecialistAgent, ProfileError> {
    let fallback = FallbackTable::new(&profile.id, profile.intents.clone())?;
    Ok(SpecialistAgent::new(
        profile.capabilities(),
        profile.match_rule(),
        profile.system_prompt.trim().to_string(),
        fallback,
        llm,
        providers,
        controller,
    ))
}
