//! Provider registry: configured backends, health snapshots and failover
//!
//! Providers are registered once at startup and never removed. Health state is
//! refreshed on demand (no background polling); each provider moves through
//! `Unknown -> Checking -> {Available, Unavailable}` and any refresh may
//! re-enter the cycle.

use super::{ChatMessage, ChatOptions, ChatReply, LlmProvider, ProviderError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Reachability state of a single provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Unknown,
    Checking,
    Available,
    Unavailable,
}

/// Snapshot of one configured provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub available: bool,
}

/// Registry of configured inference backends
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn LlmProvider>>,
    status: RwLock<HashMap<String, ProviderStatus>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            status: RwLock::new(HashMap::new()),
        }
    }

    /// Add a provider. Fails on duplicate id; registration happens before any
    /// routing begins, so a duplicate is a configuration error.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) -> Result<(), ProviderError> {
        if self.providers.iter().any(|p| p.id() == provider.id()) {
            return Err(ProviderError::unavailable(format!(
                "provider id `{}` already registered",
                provider.id()
            )));
        }
        self.status
            .get_mut()
            .insert(provider.id().to_string(), ProviderStatus::Unknown);
        self.providers.push(provider);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn status(&self, id: &str) -> ProviderStatus {
        self.status
            .read()
            .await
            .get(id)
            .copied()
            .unwrap_or(ProviderStatus::Unknown)
    }

    /// Probe every provider and update its status
    pub async fn refresh(&self) {
        for provider in &self.providers {
            let id = provider.id().to_string();
            self.set_status(&id, ProviderStatus::Checking).await;
            let healthy = provider.health_check().await;
            let status = if healthy {
                ProviderStatus::Available
            } else {
                ProviderStatus::Unavailable
            };
            debug!(provider = %id, ?status, "health check complete");
            self.set_status(&id, status).await;
        }
    }

    async fn set_status(&self, id: &str, status: ProviderStatus) {
        self.status.write().await.insert(id.to_string(), status);
    }

    /// Current snapshot of every configured provider
    pub async fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let status = self.status.read().await;
        self.providers
            .iter()
            .map(|p| ProviderDescriptor {
                id: p.id().to_string(),
                name: p.name().to_string(),
                base_url: p.base_url().to_string(),
                models: p.models().to_vec(),
                available: status.get(p.id()) == Some(&ProviderStatus::Available),
            })
            .collect()
    }

    /// Providers whose most recent health check succeeded
    pub async fn available_providers(&self) -> Vec<ProviderDescriptor> {
        self.descriptors()
            .await
            .into_iter()
            .filter(|d| d.available)
            .collect()
    }

    /// One completion with failover: the preferred provider (when configured
    /// and registered) is tried first, then the remaining providers in
    /// registration order. A provider that fails is marked unavailable and the
    /// next one is tried; the last failure is returned when every candidate is
    /// down.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        preferred_provider: Option<&str>,
    ) -> Result<ChatReply, ProviderError> {
        let mut candidates: Vec<&Arc<dyn LlmProvider>> = Vec::new();
        if let Some(preferred) = preferred_provider {
            if let Some(p) = self.providers.iter().find(|p| p.id() == preferred) {
                candidates.push(p);
            } else {
                debug!(provider = preferred, "preferred provider not registered");
            }
        }
        for p in &self.providers {
            if !candidates.iter().any(|c| c.id() == p.id()) {
                candidates.push(p);
            }
        }

        if candidates.is_empty() {
            return Err(ProviderError::unavailable("no providers registered"));
        }

        let mut last_err = None;
        for (idx, provider) in candidates.iter().enumerate() {
            // The configured model applies to the first-choice provider;
            // failover candidates use their own default.
            let opts = if idx == 0 {
                options.clone()
            } else {
                ChatOptions {
                    model: None,
                    ..options.clone()
                }
            };

            match provider.chat(messages, &opts).await {
                Ok(reply) => {
                    self.set_status(provider.id(), ProviderStatus::Available).await;
                    return Ok(reply);
                }
                Err(err) => {
                    warn!(provider = provider.id(), error = %err, "provider call failed");
                    self.set_status(provider.id(), ProviderStatus::Unavailable).await;
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::unavailable("no providers available")))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
