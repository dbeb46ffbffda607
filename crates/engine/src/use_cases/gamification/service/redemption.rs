//! Redemption flow.
//!
//! A redemption either contributes to the live instance in its scope or, when
//! the scope is free and off cooldown, starts one with itself as the first
//! contribution. Cooldowns never block contributions to an existing instance.

use chrono::{DateTime, Utc};
use critcast_domain::{
    CampaignEventConfig, ContributionDraft, EventDefinition, EventId, EventKind, Instance,
    LifecycleEvent, ScopeKey, TriggerData,
};

use super::{surface, GamificationService};
use crate::use_cases::gamification::error::{GamificationError, InstanceError};
use crate::use_cases::gamification::instances::CreateInstance;
use crate::use_cases::gamification::types::{Redemption, RedemptionOutcome, RejectReason};

/// Where a redemption landed before the objective is looked at.
enum Landed {
    On { instance: Instance, created: bool },
    Finished(RedemptionOutcome),
}

fn rejected(reason: RejectReason) -> Landed {
    Landed::Finished(RedemptionOutcome::Rejected { reason })
}

impl GamificationService {
    /// Handle a redemption bound to an event through its external reward id.
    pub async fn handle_redemption(
        &self,
        redemption: Redemption,
    ) -> Result<RedemptionOutcome, GamificationError> {
        let config = match redemption.reward_id.as_deref() {
            Some(reward_id) => {
                self.configs
                    .find_by_reward(redemption.campaign_id, reward_id)
                    .await?
            }
            None => None,
        };
        let Some(config) = config.filter(|c| c.is_enabled) else {
            tracing::debug!(
                campaign_id = %redemption.campaign_id,
                reward_id = ?redemption.reward_id,
                "Redemption not bound to an enabled event"
            );
            return Ok(not_configured());
        };
        self.redeem(redemption, config).await
    }

    /// Handle a redemption of the single campaign-wide reward, where the
    /// caller names the event it goes to.
    pub async fn handle_legacy_redemption(
        &self,
        redemption: Redemption,
        event_id: EventId,
    ) -> Result<RedemptionOutcome, GamificationError> {
        let config = self
            .configs
            .get_config(redemption.campaign_id, event_id)
            .await?
            .filter(|c| c.is_enabled);
        let Some(config) = config else {
            tracing::debug!(
                campaign_id = %redemption.campaign_id,
                event_id = %event_id,
                "Legacy redemption for a disabled event"
            );
            return Ok(not_configured());
        };
        self.redeem(redemption, config).await
    }

    async fn redeem(
        &self,
        redemption: Redemption,
        config: CampaignEventConfig,
    ) -> Result<RedemptionOutcome, GamificationError> {
        let Some(event) = self.catalog.get_event(config.event_id).await? else {
            tracing::warn!(event_id = %config.event_id, "Configured event missing from catalog");
            return Ok(not_configured());
        };

        let draft = match ContributionDraft::new(
            redemption.streamer_id.clone(),
            redemption.contributor_id.as_str(),
            redemption.contributor_name.as_str(),
            redemption.amount,
            redemption.redemption_id.as_str(),
        ) {
            Ok(draft) => draft,
            Err(e) => {
                return Ok(RedemptionOutcome::Rejected {
                    reason: RejectReason::InvalidContribution {
                        message: e.to_string(),
                    },
                })
            }
        };

        let scope = ScopeKey::new(
            event.kind,
            config.campaign_id,
            event.id,
            &redemption.streamer_id,
        );
        let _guard = self.locks.lock(&scope).await;

        let landed = match self.instances.find_live(&scope).await? {
            Some(live) => self.contribute(live, &config, draft).await?,
            None => self.open(&scope, &redemption, &event, &config, draft).await?,
        };

        match landed {
            Landed::On { instance, created } => {
                self.settle(instance, created, &event, &config).await
            }
            Landed::Finished(outcome) => Ok(outcome),
        }
    }

    /// Add the redemption to a live instance.
    ///
    /// Replays are detected by the repository when the contribution is
    /// written. The click limit runs before that write, so a contributor at
    /// their limit is only looked up for a replay when they would be refused.
    async fn contribute(
        &self,
        live: Instance,
        config: &CampaignEventConfig,
        draft: ContributionDraft,
    ) -> Result<Landed, GamificationError> {
        if let Some(reason) = self.click_limit(config, draft.contributor_id()).await? {
            // A replayed redemption is not another click
            if self
                .instances
                .has_contribution(live.id(), draft.redemption_id())
                .await?
            {
                tracing::debug!(instance_id = %live.id(), "Redemption already counted");
                return Ok(Landed::Finished(RedemptionOutcome::Duplicate { instance: live }));
            }
            return Ok(rejected(reason));
        }

        let amount = draft.amount();
        let contributor_name = draft.contributor_name().to_string();
        match self.instances.add_contribution(live.id(), draft).await {
            Ok(result) if result.duplicate => Ok(Landed::Finished(RedemptionOutcome::Duplicate {
                instance: result.instance,
            })),
            Ok(result) => {
                self.publish(LifecycleEvent::ProgressUpdated {
                    instance: result.instance.snapshot(),
                    amount,
                    contributor_name,
                });
                Ok(Landed::On {
                    instance: result.instance,
                    created: false,
                })
            }
            Err(InstanceError::NotAccepting { instance, reason }) => {
                tracing::debug!(
                    instance_id = %instance.id(),
                    reason = %reason,
                    "Contribution refused"
                );
                Ok(rejected(self.closed_reason(&instance)))
            }
            Err(e) => Err(surface(e)),
        }
    }

    /// Start an instance with the redemption as its first contribution.
    async fn open(
        &self,
        scope: &ScopeKey,
        redemption: &Redemption,
        event: &EventDefinition,
        config: &CampaignEventConfig,
        draft: ContributionDraft,
    ) -> Result<Landed, GamificationError> {
        let cooldown = self.cooldowns.is_on_cooldown(scope).await?;
        if let Some(ends_at) = cooldown.ends_at.filter(|_| cooldown.on_cooldown) {
            tracing::debug!(scope = %scope, ends_at = %ends_at, "Creation blocked by cooldown");
            return Ok(rejected(RejectReason::OnCooldown { ends_at }));
        }
        if let Some(reason) = self.click_limit(config, draft.contributor_id()).await? {
            return Ok(rejected(reason));
        }

        let request = CreateInstance {
            event,
            config,
            streamer_id: redemption.streamer_id.clone(),
            viewer_count: redemption.viewer_count,
            trigger_data: TriggerData::Redemption {
                reward_id: redemption.reward_id.clone(),
                contributor_name: redemption.contributor_name.clone(),
            },
            first_contribution: Some(draft.clone()),
            start_filled: false,
        };
        let created = match event.kind {
            EventKind::Individual => self.instances.create_individual(request).await,
            EventKind::Group => self.instances.create_group(request).await,
        };

        match created {
            Ok(instance) => {
                self.publish(LifecycleEvent::Created {
                    instance: instance.snapshot(),
                });
                Ok(Landed::On {
                    instance,
                    created: true,
                })
            }
            // Another writer took the scope outside this process's locks
            Err(InstanceError::AlreadyLive { existing, .. }) => {
                match self.instances.find_live(scope).await? {
                    Some(live) => self.contribute(live, config, draft).await,
                    None => Ok(rejected(RejectReason::InstanceLive {
                        instance_id: existing,
                    })),
                }
            }
            Err(e) => Err(surface(e)),
        }
    }

    /// Resolve the instance if the redemption reached its objective.
    async fn settle(
        &self,
        instance: Instance,
        created: bool,
        event: &EventDefinition,
        config: &CampaignEventConfig,
    ) -> Result<RedemptionOutcome, GamificationError> {
        if !instance.objective_reached() {
            return Ok(RedemptionOutcome::Contributed { instance, created });
        }

        if event.requires_confirmation() {
            let instance = self.instances.arm(instance).await.map_err(surface)?;
            self.publish(LifecycleEvent::Armed {
                instance: instance.snapshot(),
            });
            return Ok(RedemptionOutcome::Armed { instance, created });
        }

        let handle = self.connection(config.campaign_id);
        let instance = self
            .instances
            .complete(instance, event, config, handle.as_ref(), true)
            .await
            .map_err(surface)?;
        let action = self.publish_completed(&instance);
        Ok(RedemptionOutcome::Completed {
            instance,
            action,
            created,
        })
    }

    /// `Some` when the contributor has used up their clicks this session.
    async fn click_limit(
        &self,
        config: &CampaignEventConfig,
        contributor_id: &str,
    ) -> Result<Option<RejectReason>, GamificationError> {
        let Some(limit) = config.max_clicks_per_user_per_session else {
            return Ok(None);
        };
        let since = self
            .sessions
            .started_at(config.campaign_id)
            .await?
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let used = self
            .instances
            .count_contributions_since(config.campaign_id, config.event_id, contributor_id, since)
            .await?;

        if used >= limit {
            tracing::debug!(
                campaign_id = %config.campaign_id,
                event_id = %config.event_id,
                used,
                limit,
                "Per-user click limit reached"
            );
            return Ok(Some(RejectReason::UserLimitReached { limit }));
        }
        Ok(None)
    }

    fn closed_reason(&self, instance: &Instance) -> RejectReason {
        if instance.is_live() && instance.is_expired(self.clock.now()) {
            RejectReason::InstanceExpired {
                instance_id: instance.id(),
            }
        } else {
            RejectReason::InstanceClosed {
                instance_id: instance.id(),
                status: instance.status(),
            }
        }
    }
}

fn not_configured() -> RedemptionOutcome {
    RedemptionOutcome::Rejected {
        reason: RejectReason::NotConfigured,
    }
}
