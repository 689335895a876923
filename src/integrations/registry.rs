//! Registry of configured integrations and their per-integration settings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, IntegrationConfig};
use crate::error::Result;

use super::calendar::GoogleCalendarClient;
use super::drive::DriveClient;
use super::github::GitHubClient;
use super::gmail::GmailClient;
use super::traits::Integration;
use super::types::IntegrationId;

/// Runtime settings for one integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationSettings {
    pub enabled: bool,
    /// Cache TTL
    pub cache_duration: Duration,
    /// Default item count for list operations
    pub max_items: usize,
}

impl IntegrationSettings {
    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            enabled: config.enabled,
            cache_duration: Duration::from_secs(config.cache_duration),
            max_items: config.max_items.max(1),
        }
    }
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_duration: Duration::from_secs(300),
            max_items: 10,
        }
    }
}

struct Registered {
    integration: Arc<dyn Integration>,
    settings: IntegrationSettings,
}

/// All integrations the dispatcher can reach, keyed by [`IntegrationId`].
#[derive(Default)]
pub struct IntegrationRegistry {
    entries: BTreeMap<IntegrationId, Registered>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the HTTP-backed integrations described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();

        let clients: [(IntegrationId, Arc<dyn Integration>); 4] = [
            (
                IntegrationId::Mail,
                Arc::new(GmailClient::from_config(&config.integrations.mail)?),
            ),
            (
                IntegrationId::SourceControl,
                Arc::new(GitHubClient::from_config(&config.integrations.source_control)?),
            ),
            (
                IntegrationId::Calendar,
                Arc::new(GoogleCalendarClient::from_config(&config.integrations.calendar)?),
            ),
            (
                IntegrationId::Drive,
                Arc::new(DriveClient::from_config(&config.integrations.drive)?),
            ),
        ];

        for (id, client) in clients {
            let settings = IntegrationSettings::from_config(config.integration(id));
            if !settings.enabled {
                tracing::debug!("Integration {} disabled by config", id);
            }
            registry.register(client, settings);
        }

        Ok(registry)
    }

    /// Register an integration, replacing any previous one with the same id.
    pub fn register(&mut self, integration: Arc<dyn Integration>, settings: IntegrationSettings) {
        self.entries.insert(
            integration.id(),
            Registered {
                integration,
                settings,
            },
        );
    }

    /// The integration for `id`, if registered and enabled.
    pub fn get(&self, id: IntegrationId) -> Option<Arc<dyn Integration>> {
        self.entries
            .get(&id)
            .filter(|e| e.settings.enabled)
            .map(|e| e.integration.clone())
    }

    pub fn settings(&self, id: IntegrationId) -> IntegrationSettings {
        self.entries
            .get(&id)
            .map(|e| e.settings.clone())
            .unwrap_or_else(|| IntegrationSettings {
                enabled: false,
                ..Default::default()
            })
    }

    pub fn is_enabled(&self, id: IntegrationId) -> bool {
        self.get(id).is_some()
    }

    /// Registered integration ids in stable order.
    pub fn ids(&self) -> Vec<IntegrationId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
