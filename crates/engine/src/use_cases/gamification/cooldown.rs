//! Creation cooldowns per scope.
//!
//! Cooldowns only gate creating a new instance. Contributions to an instance
//! that already exists are never blocked by them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use critcast_domain::{CampaignId, CooldownStatus, CooldownWindow, ScopeKey, StreamerId};

use crate::infrastructure::ports::{ClockPort, CooldownRepo, RepoError};

pub struct CooldownTracker {
    repo: Arc<dyn CooldownRepo>,
    clock: Arc<dyn ClockPort>,
}

impl CooldownTracker {
    pub fn new(repo: Arc<dyn CooldownRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    pub async fn is_on_cooldown(&self, scope: &ScopeKey) -> Result<CooldownStatus, RepoError> {
        let window = self.repo.get(scope).await?;
        Ok(CooldownStatus::from_window(
            window.as_ref(),
            self.clock.now(),
        ))
    }

    /// Open a window of `seconds` starting at `now`. Zero writes nothing.
    pub async fn start_cooldown(
        &self,
        scope: &ScopeKey,
        seconds: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<CooldownWindow>, RepoError> {
        if seconds == 0 {
            return Ok(None);
        }

        let ends_at = now + Duration::seconds(i64::from(seconds));
        let window = CooldownWindow::new(scope.clone(), ends_at);
        self.repo.upsert(&window).await?;
        tracing::info!(scope = %scope, ends_at = %window.ends_at, "Cooldown started");
        Ok(Some(window))
    }

    /// Clear every window in a campaign (session start).
    pub async fn reset_all(&self, campaign_id: CampaignId) -> Result<u64, RepoError> {
        self.reset_filtered(campaign_id, None).await
    }

    pub async fn reset_filtered(
        &self,
        campaign_id: CampaignId,
        streamer_id: Option<StreamerId>,
    ) -> Result<u64, RepoError> {
        let cleared = self.repo.clear(campaign_id, streamer_id.clone()).await?;
        tracing::info!(
            campaign_id = %campaign_id,
            streamer_id = ?streamer_id.as_ref().map(StreamerId::as_str),
            cleared,
            "Cooldowns reset"
        );
        Ok(cleared)
    }
}
