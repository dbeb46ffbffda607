//! In-memory cooldown windows and session markers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::{CampaignId, CooldownWindow, ScopeKey, StreamerId};
use dashmap::DashMap;

use crate::infrastructure::ports::{CooldownRepo, RepoError, SessionRepo};

#[derive(Default)]
pub struct InMemoryCooldownRepo {
    windows: DashMap<ScopeKey, CooldownWindow>,
}

impl InMemoryCooldownRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownRepo for InMemoryCooldownRepo {
    async fn get(&self, scope: &ScopeKey) -> Result<Option<CooldownWindow>, RepoError> {
        Ok(self.windows.get(scope).map(|w| w.value().clone()))
    }

    async fn upsert(&self, window: &CooldownWindow) -> Result<(), RepoError> {
        self.windows.insert(window.scope.clone(), window.clone());
        Ok(())
    }

    async fn clear(
        &self,
        campaign_id: CampaignId,
        streamer_id: Option<StreamerId>,
    ) -> Result<u64, RepoError> {
        let before = self.windows.len();
        self.windows.retain(|scope, _| {
            let in_campaign = scope.campaign_id == campaign_id;
            let matches_streamer = match &streamer_id {
                Some(streamer) => scope.streamer_id.as_ref() == Some(streamer),
                None => true,
            };
            !(in_campaign && matches_streamer)
        });
        Ok((before - self.windows.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemorySessionRepo {
    started: DashMap<CampaignId, DateTime<Utc>>,
}

impl InMemorySessionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepo for InMemorySessionRepo {
    async fn started_at(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<DateTime<Utc>>, RepoError> {
        Ok(self.started.get(&campaign_id).map(|at| *at))
    }

    async fn start(&self, campaign_id: CampaignId, at: DateTime<Utc>) -> Result<(), RepoError> {
        self.started.insert(campaign_id, at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::fixed_time;
    use critcast_domain::EventId;

    #[tokio::test]
    async fn clear_for_streamer_keeps_group_and_other_windows() {
        let repo = InMemoryCooldownRepo::new();
        let campaign = CampaignId::new();
        let other_campaign = CampaignId::new();
        let alice = StreamerId::new("alice");
        let bob = StreamerId::new("bob");
        let event = EventId::new();

        for scope in [
            ScopeKey::new(critcast_domain::EventKind::Individual, campaign, event, &alice),
            ScopeKey::new(critcast_domain::EventKind::Individual, campaign, event, &bob),
            ScopeKey::group(campaign, event),
            ScopeKey::new(critcast_domain::EventKind::Individual, other_campaign, event, &alice),
        ] {
            repo.upsert(&CooldownWindow::new(scope, fixed_time()))
                .await
                .unwrap();
        }

        assert_eq!(repo.clear(campaign, Some(alice.clone())).await.unwrap(), 1);
        assert_eq!(repo.clear(campaign, None).await.unwrap(), 2);
        assert_eq!(repo.windows.len(), 1);
    }
}
