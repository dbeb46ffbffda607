//! Dice-roll flow.

use critcast_domain::{
    CampaignEventConfig, CriticalType, DiceRoll, EventDefinition, InstanceStatus, LifecycleEvent,
    ScopeKey,
};

use super::{resolved_action, surface, GamificationService};
use crate::use_cases::gamification::error::{GamificationError, InstanceError};
use crate::use_cases::gamification::instances::CreateInstance;
use crate::use_cases::gamification::types::DiceRollOutcome;

impl GamificationService {
    /// Handle a roll reported by the game table.
    ///
    /// A critical roll first tries to confirm an armed instance for the same
    /// streamer; only when none is confirmed does it start new instances.
    pub async fn handle_dice_roll(
        &self,
        roll: DiceRoll,
    ) -> Result<DiceRollOutcome, GamificationError> {
        let pairs = self.enabled_events(roll.campaign_id).await?;
        if pairs.is_empty() {
            tracing::debug!(campaign_id = %roll.campaign_id, "No enabled events; roll ignored");
            return Ok(DiceRollOutcome::Ignored);
        }

        if let Some(critical) = roll.critical() {
            if let Some(outcome) = self.consume_armed(&roll, critical, &pairs).await? {
                return Ok(outcome);
            }
        }

        for (event, config) in &pairs {
            if !event.is_dice_triggered() {
                continue;
            }
            if !event.kind.is_individual() {
                tracing::debug!(
                    event_id = %event.id,
                    "Dice-triggered group events not implemented"
                );
                continue;
            }

            let evaluation = self.evaluator.evaluate(event, &roll);
            if !evaluation.should_trigger {
                continue;
            }
            let Some(trigger_data) = evaluation.trigger_data else {
                continue;
            };

            let scope = ScopeKey::new(event.kind, config.campaign_id, event.id, &roll.streamer_id);
            let _guard = self.locks.lock(&scope).await;

            let cooldown = self.cooldowns.is_on_cooldown(&scope).await?;
            if cooldown.on_cooldown {
                tracing::debug!(scope = %scope, ends_at = ?cooldown.ends_at, "Event on cooldown");
                continue;
            }

            let request = CreateInstance {
                event,
                config,
                streamer_id: roll.streamer_id.clone(),
                viewer_count: roll.viewer_count,
                trigger_data,
                first_contribution: None,
                start_filled: false,
            };
            match self.instances.create_individual(request).await {
                Ok(instance) => {
                    self.publish(LifecycleEvent::Created {
                        instance: instance.snapshot(),
                    });
                    return Ok(DiceRollOutcome::Created { instance });
                }
                Err(InstanceError::AlreadyLive { existing, .. }) => {
                    tracing::debug!(scope = %scope, existing = %existing, "Scope already live");
                }
                Err(e) => return Err(surface(e)),
            }
        }

        Ok(DiceRollOutcome::Ignored)
    }

    /// Confirm the first armed instance, in config order, whose event accepts
    /// this critical side.
    async fn consume_armed(
        &self,
        roll: &DiceRoll,
        critical: CriticalType,
        pairs: &[(EventDefinition, CampaignEventConfig)],
    ) -> Result<Option<DiceRollOutcome>, GamificationError> {
        let live = self
            .instances
            .live_for_streamer(roll.campaign_id, &roll.streamer_id, None)
            .await?;
        if live.is_empty() {
            return Ok(None);
        }

        let handle = self.connection(roll.campaign_id);
        for (event, config) in pairs {
            if !event.trigger_config.accepts(critical) {
                continue;
            }
            let Some(armed) = live
                .iter()
                .find(|i| i.event_id() == event.id && i.status() == InstanceStatus::Armed)
            else {
                continue;
            };

            let _guard = self.locks.lock(&armed.scope()).await;
            let context = roll.context();
            match self
                .instances
                .consume_armed(armed.clone(), event, config, handle.as_ref(), context.clone())
                .await
            {
                Ok(instance) => {
                    self.publish(LifecycleEvent::Consumed {
                        instance: instance.snapshot(),
                        roll: context,
                    });
                    let action = resolved_action(&instance);
                    return Ok(Some(DiceRollOutcome::Consumed { instance, action }));
                }
                Err(InstanceError::Conflict(id)) => {
                    tracing::debug!(instance_id = %id, "Armed instance resolved elsewhere");
                }
                Err(e) => return Err(surface(e)),
            }
        }

        tracing::debug!(
            campaign_id = %roll.campaign_id,
            critical = %critical,
            "No armed instance accepts this critical"
        );
        Ok(None)
    }
}
