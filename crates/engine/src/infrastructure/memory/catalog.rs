//! Read-only event catalog and campaign configuration, seeded from JSON.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use critcast_domain::{CampaignEventConfig, CampaignId, EventDefinition, EventId};
use serde::Deserialize;

use crate::infrastructure::ports::{CampaignConfigRepo, EventCatalogRepo, RepoError};

/// Shape of the catalog seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSeed {
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub campaign_configs: Vec<CampaignEventConfig>,
}

/// Catalog held in memory. Admin editing lives elsewhere; this is loaded once.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    events: HashMap<EventId, EventDefinition>,
    /// One config per (campaign, event); later entries replace earlier ones
    configs: HashMap<(CampaignId, EventId), CampaignEventConfig>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Result<Self, RepoError> {
        let mut catalog = Self::new();
        for event in seed.events {
            catalog = catalog.with_event(event);
        }
        for config in seed.campaign_configs {
            if !catalog.events.contains_key(&config.event_id) {
                return Err(RepoError::constraint(format!(
                    "campaign config for {} references unknown event {}",
                    config.campaign_id, config.event_id
                )));
            }
            catalog = catalog.with_config(config);
        }
        Ok(catalog)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RepoError::database("catalog_load", format!("{}: {e}", path.display())))?;
        let seed: CatalogSeed =
            serde_json::from_str(&raw).map_err(|e| RepoError::serialization(e.to_string()))?;
        Self::from_seed(seed)
    }

    pub fn with_event(mut self, event: EventDefinition) -> Self {
        self.events.insert(event.id, event);
        self
    }

    pub fn with_config(mut self, config: CampaignEventConfig) -> Self {
        self.configs
            .insert((config.campaign_id, config.event_id), config);
        self
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }
}

#[async_trait]
impl EventCatalogRepo for InMemoryCatalog {
    async fn get_event(&self, id: EventId) -> Result<Option<EventDefinition>, RepoError> {
        Ok(self.events.get(&id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<EventDefinition>, RepoError> {
        let mut events: Vec<_> = self.events.values().cloned().collect();
        events.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(events)
    }
}

#[async_trait]
impl CampaignConfigRepo for InMemoryCatalog {
    async fn get_config(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
    ) -> Result<Option<CampaignEventConfig>, RepoError> {
        Ok(self.configs.get(&(campaign_id, event_id)).cloned())
    }

    async fn list_enabled(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEventConfig>, RepoError> {
        let mut configs: Vec<_> = self
            .configs
            .values()
            .filter(|c| c.campaign_id == campaign_id && c.is_enabled)
            .cloned()
            .collect();
        configs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(configs)
    }

    async fn find_by_reward(
        &self,
        campaign_id: CampaignId,
        reward_id: &str,
    ) -> Result<Option<CampaignEventConfig>, RepoError> {
        Ok(self
            .configs
            .values()
            .find(|c| c.campaign_id == campaign_id && c.is_enabled && c.matches_reward(reward_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use critcast_domain::{ActionType, EventKind, TriggerType};

    fn event(slug: &str) -> EventDefinition {
        EventDefinition::new(
            slug,
            slug,
            EventKind::Individual,
            TriggerType::DiceCritical,
            ActionType::SpellBuff,
        )
    }

    #[tokio::test]
    async fn list_enabled_orders_by_creation_and_skips_disabled() {
        let campaign = CampaignId::new();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (a, b, c) = (event("a"), event("b"), event("c"));

        let catalog = InMemoryCatalog::new()
            .with_event(a.clone())
            .with_event(b.clone())
            .with_event(c.clone())
            .with_config(CampaignEventConfig::new(campaign, b.id, t0 + Duration::minutes(1)))
            .with_config(CampaignEventConfig::new(campaign, a.id, t0 + Duration::minutes(2)))
            .with_config(CampaignEventConfig::new(campaign, c.id, t0).with_enabled(false));

        let enabled = catalog.list_enabled(campaign).await.unwrap();
        let ids: Vec<_> = enabled.iter().map(|c| c.event_id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn find_by_reward_ignores_disabled_configs() {
        let campaign = CampaignId::new();
        let e = event("surge");
        let catalog = InMemoryCatalog::new().with_event(e.clone()).with_config(
            CampaignEventConfig::new(campaign, e.id, Utc::now())
                .with_reward("reward-1")
                .with_enabled(false),
        );

        assert!(catalog
            .find_by_reward(campaign, "reward-1")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn seed_rejects_configs_for_unknown_events() {
        let seed = CatalogSeed {
            events: vec![],
            campaign_configs: vec![CampaignEventConfig::new(
                CampaignId::new(),
                EventId::new(),
                Utc::now(),
            )],
        };
        assert!(InMemoryCatalog::from_seed(seed).is_err());
    }

    #[tokio::test]
    async fn loads_seed_file_from_disk() {
        let e = event("arcane-surge");
        let campaign = CampaignId::new();
        let seed = serde_json::json!({
            "events": [e],
            "campaignConfigs": [CampaignEventConfig::new(campaign, e.id, Utc::now())],
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, seed.to_string()).unwrap();

        let catalog = InMemoryCatalog::from_path(&path).await.unwrap();
        assert_eq!(catalog.event_count(), 1);
        assert_eq!(catalog.config_count(), 1);
        assert!(catalog.get_config(campaign, e.id).await.unwrap().is_some());
    }
}
