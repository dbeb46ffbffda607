//! Lifecycle coordinator.
//!
//! Routes the three inbound signals (dice rolls, viewer redemptions, operator
//! triggers) through the trigger evaluator, cooldown tracker and instance
//! manager. Every create or contribute for a scope runs under that scope's
//! lock. Broadcasts and advisory probes are handed to `BackgroundTasks` and
//! never awaited by the signal path.

mod dice;
mod manual;
mod redemption;


use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use critcast_domain::{
    ActionResult, CampaignEventConfig, CampaignId, Contribution, EventDefinition, Instance,
    InstanceId, InstanceStatus, LifecycleEvent, StreamerId,
};

use super::cooldown::CooldownTracker;
use super::error::{GamificationError, InstanceError};
use super::instances::InstanceManager;
use super::trigger::TriggerEvaluator;
use super::types::SessionStarted;
use crate::infrastructure::ports::{
    BroadcastPort, CampaignConfigRepo, ClockPort, ConnectionHandle, EventCatalogRepo,
    GameTableConnectionsPort, HealthProbePort, SessionRepo,
};
use crate::infrastructure::tasks::BackgroundTasks;
use crate::stores::KeyedLocks;

pub struct GamificationService {
    catalog: Arc<dyn EventCatalogRepo>,
    configs: Arc<dyn CampaignConfigRepo>,
    sessions: Arc<dyn SessionRepo>,
    instances: Arc<InstanceManager>,
    cooldowns: Arc<CooldownTracker>,
    connections: Arc<dyn GameTableConnectionsPort>,
    probe: Arc<dyn HealthProbePort>,
    broadcaster: Arc<dyn BroadcastPort>,
    tasks: BackgroundTasks,
    locks: Arc<KeyedLocks>,
    evaluator: TriggerEvaluator,
    clock: Arc<dyn ClockPort>,
    probe_timeout: Duration,
}

impl GamificationService {
    pub fn new(
        catalog: Arc<dyn EventCatalogRepo>,
        configs: Arc<dyn CampaignConfigRepo>,
        sessions: Arc<dyn SessionRepo>,
        instances: Arc<InstanceManager>,
        cooldowns: Arc<CooldownTracker>,
        connections: Arc<dyn GameTableConnectionsPort>,
        probe: Arc<dyn HealthProbePort>,
        broadcaster: Arc<dyn BroadcastPort>,
        tasks: BackgroundTasks,
        clock: Arc<dyn ClockPort>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            configs,
            sessions,
            instances,
            cooldowns,
            connections,
            probe,
            broadcaster,
            tasks,
            locks: Arc::new(KeyedLocks::new()),
            evaluator: TriggerEvaluator::new(),
            clock,
            probe_timeout,
        }
    }

    // =========================================================================
    // Session and cooldown administration
    // =========================================================================

    /// Mark the start of a streaming session: records the start time used by
    /// per-user click limits and clears every cooldown in the campaign.
    pub async fn start_session(
        &self,
        campaign_id: CampaignId,
    ) -> Result<SessionStarted, GamificationError> {
        let started_at = self.clock.now();
        self.sessions.start(campaign_id, started_at).await?;
        let cooldowns_cleared = self.cooldowns.reset_all(campaign_id).await?;

        tracing::info!(campaign_id = %campaign_id, cooldowns_cleared, "Session started");
        Ok(SessionStarted {
            campaign_id,
            started_at,
            cooldowns_cleared,
        })
    }

    pub async fn reset_cooldowns(
        &self,
        campaign_id: CampaignId,
        streamer_id: Option<StreamerId>,
    ) -> Result<u64, GamificationError> {
        Ok(self
            .cooldowns
            .reset_filtered(campaign_id, streamer_id)
            .await?)
    }

    // =========================================================================
    // Instance administration
    // =========================================================================

    pub async fn cancel_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Instance, GamificationError> {
        let current = self.instances.get(instance_id).await?;
        let _guard = self.locks.lock(&current.scope()).await;

        let cancelled = self
            .instances
            .cancel(instance_id)
            .await
            .map_err(surface)?;
        self.publish(LifecycleEvent::Cancelled {
            instance: cancelled.snapshot(),
        });
        Ok(cancelled)
    }

    /// Cancel every live instance in the campaign whose time ran out.
    pub async fn cancel_expired(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Instance>, GamificationError> {
        let mut cancelled = Vec::new();
        for candidate in self.instances.expired_live(campaign_id).await? {
            let _guard = self.locks.lock(&candidate.scope()).await;
            if let Some(instance) = self
                .instances
                .cancel_if_expired(candidate.id())
                .await
                .map_err(surface)?
            {
                self.publish(LifecycleEvent::Cancelled {
                    instance: instance.snapshot(),
                });
                cancelled.push(instance);
            }
        }

        tracing::info!(
            campaign_id = %campaign_id,
            count = cancelled.len(),
            "Expired instances cancelled"
        );
        Ok(cancelled)
    }

    pub async fn get_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Instance, GamificationError> {
        Ok(self.instances.get(instance_id).await?)
    }

    pub async fn list_instances(
        &self,
        campaign_id: CampaignId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Instance>, GamificationError> {
        Ok(self.instances.list(campaign_id, status).await?)
    }

    pub async fn list_contributions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Contribution>, GamificationError> {
        self.instances.get(instance_id).await?;
        Ok(self.instances.contributions(instance_id).await?)
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    /// Enabled configs for a campaign paired with their catalog events, oldest
    /// config first. Configs pointing at a missing event are skipped.
    async fn enabled_events(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<(EventDefinition, CampaignEventConfig)>, GamificationError> {
        let configs = self.configs.list_enabled(campaign_id).await?;
        let mut pairs = Vec::with_capacity(configs.len());
        for config in configs {
            match self.catalog.get_event(config.event_id).await? {
                Some(event) => pairs.push((event, config)),
                None => {
                    tracing::warn!(
                        campaign_id = %campaign_id,
                        event_id = %config.event_id,
                        "Enabled config references an unknown event"
                    );
                }
            }
        }
        Ok(pairs)
    }

    fn connection(&self, campaign_id: CampaignId) -> Option<ConnectionHandle> {
        self.connections.handle_for(campaign_id)
    }

    /// Hand a lifecycle event to the broadcaster without waiting on it.
    fn publish(&self, event: LifecycleEvent) {
        let broadcaster = self.broadcaster.clone();
        let campaign_id = event.campaign_id();
        self.tasks.spawn("broadcast", async move {
            broadcaster.publish(campaign_id, event).await;
            Ok::<(), Infallible>(())
        });
    }

    fn publish_completed(&self, instance: &Instance) -> ActionResult {
        let action = resolved_action(instance);
        self.publish(LifecycleEvent::Completed {
            instance: instance.snapshot(),
            success: action.success,
            message: action.message.clone(),
        });
        action
    }
}

/// The action recorded on a resolved instance.
fn resolved_action(instance: &Instance) -> ActionResult {
    instance
        .result_data()
        .map(|r| r.action.clone())
        .unwrap_or_else(|| ActionResult::failure("no result recorded"))
}

/// Convert an instance error for callers, logging contract violations.
fn surface(e: InstanceError) -> GamificationError {
    let e = GamificationError::from(e);
    if let GamificationError::InvalidTransition(inner) = &e {
        tracing::error!(error = %inner, "Invalid instance transition");
    }
    e
}
