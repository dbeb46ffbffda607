//! Operator-triggered events.

use critcast_domain::{EventDefinition, EventKind, LifecycleEvent, ScopeKey, TriggerData};

use super::{surface, GamificationService};
use crate::infrastructure::ports::{HealthProbeRequest, ProbeMode};
use crate::use_cases::gamification::error::{GamificationError, InstanceError};
use crate::use_cases::gamification::instances::CreateInstance;
use crate::use_cases::gamification::types::{
    ManualTrigger, ManualTriggerOutcome, RejectReason, TriggerMode,
};

/// Reported when the blocking probe itself failed.
pub const PROBE_FAILED_CHECK: &str = "health_probe";
/// Reported when the blocking probe did not answer in time.
pub const PROBE_TIMEOUT_CHECK: &str = "health_probe_timeout";

impl GamificationService {
    /// Fire an event on behalf of an operator.
    ///
    /// The instance starts with its objective met and completes straight
    /// away, whatever the action type.
    pub async fn trigger_manual(
        &self,
        trigger: ManualTrigger,
    ) -> Result<ManualTriggerOutcome, GamificationError> {
        let config = self
            .configs
            .get_config(trigger.campaign_id, trigger.event_id)
            .await?
            .filter(|c| c.is_enabled);
        let Some(config) = config else {
            tracing::debug!(
                campaign_id = %trigger.campaign_id,
                event_id = %trigger.event_id,
                mode = ?trigger.mode,
                "Manual trigger for a disabled event"
            );
            return Ok(ManualTriggerOutcome::Rejected {
                reason: RejectReason::NotConfigured,
            });
        };
        let event = self
            .catalog
            .get_event(trigger.event_id)
            .await?
            .ok_or(GamificationError::EventNotFound(trigger.event_id))?;

        match trigger.mode {
            TriggerMode::Standard => self.spawn_advisory_probe(&trigger, &event),
            TriggerMode::Gated => {
                if let Some(failing_checks) = self.gate(&trigger, &event).await {
                    tracing::warn!(
                        campaign_id = %trigger.campaign_id,
                        event_id = %trigger.event_id,
                        ?failing_checks,
                        "Manual trigger refused by health probe"
                    );
                    return Ok(ManualTriggerOutcome::Unhealthy { failing_checks });
                }
            }
            TriggerMode::Test => {}
        }

        let test_mode = trigger.mode == TriggerMode::Test;
        let scope = ScopeKey::new(
            event.kind,
            trigger.campaign_id,
            event.id,
            &trigger.streamer_id,
        );
        let _guard = self.locks.lock(&scope).await;

        if !test_mode {
            let cooldown = self.cooldowns.is_on_cooldown(&scope).await?;
            if let Some(ends_at) = cooldown.ends_at.filter(|_| cooldown.on_cooldown) {
                return Ok(ManualTriggerOutcome::Rejected {
                    reason: RejectReason::OnCooldown { ends_at },
                });
            }
        }

        // Test runs leave no cooldown behind
        let config = if test_mode {
            config.with_cooldown_seconds(0)
        } else {
            config
        };

        let request = CreateInstance {
            event: &event,
            config: &config,
            streamer_id: trigger.streamer_id.clone(),
            viewer_count: trigger.viewer_count,
            trigger_data: TriggerData::Manual {
                test_mode,
                requested_by: trigger.requested_by.clone(),
            },
            first_contribution: None,
            start_filled: true,
        };
        let created = match event.kind {
            EventKind::Individual => self.instances.create_individual(request).await,
            EventKind::Group => self.instances.create_group(request).await,
        };
        let instance = match created {
            Ok(instance) => instance,
            Err(InstanceError::AlreadyLive { existing, .. }) => {
                return Ok(ManualTriggerOutcome::Rejected {
                    reason: RejectReason::InstanceLive {
                        instance_id: existing,
                    },
                })
            }
            Err(e) => return Err(surface(e)),
        };
        self.publish(LifecycleEvent::Created {
            instance: instance.snapshot(),
        });

        let handle = self.connection(trigger.campaign_id);
        let instance = self
            .instances
            .complete(instance, &event, &config, handle.as_ref(), true)
            .await
            .map_err(surface)?;
        let action = self.publish_completed(&instance);

        tracing::info!(
            instance_id = %instance.id(),
            mode = ?trigger.mode,
            success = action.success,
            "Manual trigger completed"
        );
        Ok(ManualTriggerOutcome::Completed { instance, action })
    }

    fn probe_request(
        &self,
        trigger: &ManualTrigger,
        event: &EventDefinition,
        mode: ProbeMode,
    ) -> HealthProbeRequest {
        let mut metadata = serde_json::Map::new();
        metadata.insert("eventId".into(), event.id.to_string().into());
        metadata.insert("eventSlug".into(), event.slug.clone().into());
        metadata.insert(
            "streamerId".into(),
            trigger.streamer_id.as_str().to_string().into(),
        );
        if let Some(by) = &trigger.requested_by {
            metadata.insert("requestedBy".into(), by.clone().into());
        }
        HealthProbeRequest {
            campaign_id: trigger.campaign_id,
            event_type: event.action_type.as_str().to_string(),
            mode,
            metadata,
        }
    }

    /// Light probe in the background; its verdict is only logged.
    fn spawn_advisory_probe(&self, trigger: &ManualTrigger, event: &EventDefinition) {
        let probe = self.probe.clone();
        let request = self.probe_request(trigger, event, ProbeMode::Light);
        self.tasks.spawn("advisory_probe", async move {
            let campaign_id = request.campaign_id;
            let report = probe.run(request).await?;
            if !report.healthy {
                tracing::warn!(
                    campaign_id = %campaign_id,
                    failing_checks = ?report.failing_checks(),
                    "Advisory health probe reported problems"
                );
            }
            Ok::<(), crate::infrastructure::ports::HealthProbeError>(())
        });
    }

    /// Blocking full probe. Returns the failing checks, or `None` when healthy.
    async fn gate(&self, trigger: &ManualTrigger, event: &EventDefinition) -> Option<Vec<String>> {
        let request = self.probe_request(trigger, event, ProbeMode::Full);
        match tokio::time::timeout(self.probe_timeout, self.probe.run(request)).await {
            Ok(Ok(report)) if report.healthy => None,
            Ok(Ok(report)) => Some(report.failing_checks()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Health probe failed");
                Some(vec![PROBE_FAILED_CHECK.to_string()])
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.probe_timeout, "Health probe timed out");
                Some(vec![PROBE_TIMEOUT_CHECK.to_string()])
            }
        }
    }
}
