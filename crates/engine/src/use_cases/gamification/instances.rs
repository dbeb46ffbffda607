//! Instance state machine orchestration.
//!
//! `Instance` owns the transition rules; this module adds the side effects
//! around them: objective sizing, the action call, the cooldown window and
//! persistence. Persisted transitions are compare-and-set on the prior status.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use critcast_domain::{
    CampaignEventConfig, CampaignId, Contribution, ContributionDraft, DomainError, EventDefinition,
    EventId, EventKind, Instance, InstanceId, InstanceStatus, NewInstance, ResultData, RollContext,
    ScopeKey, StreamerId, TriggerData,
};

use super::action_executor::{ActionContext, ActionExecutor};
use super::cooldown::CooldownTracker;
use super::error::InstanceError;
use crate::infrastructure::ports::{
    ClockPort, ConnectionHandle, ContributionApplied, InsertOutcome, InstanceRepo,
    ObjectiveCalculator,
};

/// Everything needed to start an instance.
#[derive(Debug, Clone)]
pub struct CreateInstance<'a> {
    pub event: &'a EventDefinition,
    pub config: &'a CampaignEventConfig,
    pub streamer_id: StreamerId,
    pub viewer_count: u32,
    pub trigger_data: TriggerData,
    /// Recorded in the same atomic insert as the instance
    pub first_contribution: Option<ContributionDraft>,
    /// Start with the objective already met (operator triggers)
    pub start_filled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributionResult {
    pub instance: Instance,
    pub objective_reached: bool,
    /// The redemption id had been recorded before; nothing changed
    pub duplicate: bool,
}

pub struct InstanceManager {
    repo: Arc<dyn InstanceRepo>,
    objective: Arc<dyn ObjectiveCalculator>,
    executor: Arc<ActionExecutor>,
    cooldowns: Arc<CooldownTracker>,
    clock: Arc<dyn ClockPort>,
}

impl InstanceManager {
    pub fn new(
        repo: Arc<dyn InstanceRepo>,
        objective: Arc<dyn ObjectiveCalculator>,
        executor: Arc<ActionExecutor>,
        cooldowns: Arc<CooldownTracker>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            repo,
            objective,
            executor,
            cooldowns,
            clock,
        }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    pub async fn create_individual(
        &self,
        request: CreateInstance<'_>,
    ) -> Result<Instance, InstanceError> {
        self.create(EventKind::Individual, request).await
    }

    pub async fn create_group(
        &self,
        request: CreateInstance<'_>,
    ) -> Result<Instance, InstanceError> {
        self.create(EventKind::Group, request).await
    }

    async fn create(
        &self,
        kind: EventKind,
        request: CreateInstance<'_>,
    ) -> Result<Instance, InstanceError> {
        if request.event.kind != kind {
            return Err(DomainError::validation(format!(
                "event {} is {}, not {}",
                request.event.slug,
                request.event.kind.as_str(),
                kind.as_str()
            ))
            .into());
        }

        let now = self.clock.now();
        let objective_target = self
            .objective
            .compute(request.viewer_count, request.config);

        let mut instance = Instance::start(
            NewInstance {
                campaign_id: request.config.campaign_id,
                event_id: request.event.id,
                streamer_id: request.streamer_id,
                kind,
                objective_target,
                duration: request.config.duration(),
                viewer_count: request.viewer_count,
                trigger_data: request.trigger_data,
            },
            now,
        )?;

        if request.start_filled {
            instance.fill_objective()?;
        }

        let first = match request.first_contribution {
            Some(draft) => {
                instance.add_progress(draft.amount(), now)?;
                Some(Contribution::record(instance.id(), draft, now))
            }
            None => None,
        };

        match self.repo.insert_if_absent(instance.clone(), first).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    instance_id = %instance.id(),
                    scope = %instance.scope(),
                    objective_target,
                    progress = instance.current_progress(),
                    "Instance created"
                );
                Ok(instance)
            }
            InsertOutcome::Occupied(existing) => Err(InstanceError::AlreadyLive {
                scope: existing.scope(),
                existing: existing.id(),
            }),
        }
    }

    // =========================================================================
    // Contributions
    // =========================================================================

    /// Add a contribution. Replayed redemption ids are a no-op.
    pub async fn add_contribution(
        &self,
        instance_id: InstanceId,
        draft: ContributionDraft,
    ) -> Result<ContributionResult, InstanceError> {
        let now = self.clock.now();
        match self.repo.apply_contribution(instance_id, draft, now).await {
            Ok(ContributionApplied::Applied {
                instance,
                objective_reached,
            }) => Ok(ContributionResult {
                instance,
                objective_reached,
                duplicate: false,
            }),
            Ok(ContributionApplied::Duplicate { instance }) => {
                tracing::debug!(instance_id = %instance_id, "Duplicate contribution ignored");
                Ok(ContributionResult {
                    objective_reached: instance.objective_reached(),
                    instance,
                    duplicate: true,
                })
            }
            Ok(ContributionApplied::NotAccepting { instance, reason }) => {
                Err(InstanceError::NotAccepting {
                    instance: Box::new(instance),
                    reason,
                })
            }
            Err(e) if e.is_not_found() => Err(InstanceError::NotFound(instance_id)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn accepts_contributions(&self, instance: &Instance) -> bool {
        instance.accepts_contributions(self.clock.now())
    }

    pub async fn count_contributions_since(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
        contributor_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, InstanceError> {
        Ok(self
            .repo
            .count_contributions_since(campaign_id, event_id, contributor_id, since)
            .await?)
    }

    pub async fn has_contribution(
        &self,
        instance_id: InstanceId,
        redemption_id: &str,
    ) -> Result<bool, InstanceError> {
        Ok(self
            .repo
            .find_contribution(instance_id, redemption_id)
            .await?
            .is_some())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    pub async fn arm(&self, mut instance: Instance) -> Result<Instance, InstanceError> {
        let expected = instance.status();
        instance.arm(self.clock.now())?;
        self.persist(&instance, expected).await?;
        tracing::info!(instance_id = %instance.id(), "Instance armed");
        Ok(instance)
    }

    /// Run the action and complete an `Active` instance.
    ///
    /// Works from the stored instance, so a caller holding an outdated copy
    /// gets `Conflict` before any action is sent.
    pub async fn complete(
        &self,
        instance: Instance,
        event: &EventDefinition,
        config: &CampaignEventConfig,
        handle: Option<&ConnectionHandle>,
        immediate: bool,
    ) -> Result<Instance, InstanceError> {
        let mut instance = self.current(&instance).await?;
        instance.ensure_completable()?;

        let roll = match instance.trigger_data() {
            TriggerData::DiceRoll { roll } => Some(roll.clone()),
            _ => None,
        };
        let action = self
            .executor
            .execute(event, config, handle, &action_context(&instance, roll))
            .await;

        let now = self.clock.now();
        let result = ResultData {
            action,
            immediate,
            confirming_roll: None,
        };
        instance.complete(result, cooldown_end(config, now), now)?;
        self.persist(&instance, InstanceStatus::Active).await?;
        self.cooldowns
            .start_cooldown(&instance.scope(), config.cooldown_seconds, now)
            .await?;

        tracing::info!(
            instance_id = %instance.id(),
            success = instance.result_data().map(ResultData::succeeded),
            "Instance completed"
        );
        Ok(instance)
    }

    /// Resolve an `Armed` instance with a confirming critical roll.
    ///
    /// Like `complete`, re-reads the instance before the action runs.
    pub async fn consume_armed(
        &self,
        instance: Instance,
        event: &EventDefinition,
        config: &CampaignEventConfig,
        handle: Option<&ConnectionHandle>,
        roll: RollContext,
    ) -> Result<Instance, InstanceError> {
        let mut instance = self.current(&instance).await?;
        instance.ensure_consumable()?;
        let confirms = roll
            .critical_type
            .is_some_and(|critical| event.trigger_config.accepts(critical));
        if !confirms {
            return Err(DomainError::constraint(format!(
                "roll does not confirm event {}",
                event.slug
            ))
            .into());
        }

        let action = self
            .executor
            .execute(event, config, handle, &action_context(&instance, Some(roll.clone())))
            .await;

        let now = self.clock.now();
        instance.consume(
            ResultData::confirmed(action, roll),
            cooldown_end(config, now),
            now,
        )?;
        self.persist(&instance, InstanceStatus::Armed).await?;
        self.cooldowns
            .start_cooldown(&instance.scope(), config.cooldown_seconds, now)
            .await?;

        tracing::info!(instance_id = %instance.id(), "Armed instance consumed");
        Ok(instance)
    }

    /// Administrative cancel. No cooldown is started.
    pub async fn cancel(&self, instance_id: InstanceId) -> Result<Instance, InstanceError> {
        let mut instance = self.get(instance_id).await?;
        let expected = instance.status();
        instance.cancel(self.clock.now())?;
        self.persist(&instance, expected).await?;
        tracing::info!(instance_id = %instance_id, from = %expected, "Instance cancelled");
        Ok(instance)
    }

    /// Live instances in a campaign whose `expires_at` has passed.
    pub async fn expired_live(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Instance>, InstanceError> {
        let now = self.clock.now();
        Ok(self
            .repo
            .list_for_campaign(campaign_id, None)
            .await?
            .into_iter()
            .filter(|i| i.is_live() && i.is_expired(now))
            .collect())
    }

    /// Cancel an instance only if it is still live and expired.
    ///
    /// `None` when another transition got there first.
    pub async fn cancel_if_expired(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<Instance>, InstanceError> {
        let mut instance = self.get(instance_id).await?;
        let now = self.clock.now();
        if !instance.is_live() || !instance.is_expired(now) {
            return Ok(None);
        }
        let expected = instance.status();
        instance.cancel(now)?;
        match self.persist(&instance, expected).await {
            Ok(()) => {
                tracing::info!(
                    instance_id = %instance_id,
                    from = %expected,
                    "Expired instance cancelled"
                );
                Ok(Some(instance))
            }
            Err(InstanceError::Conflict(id)) => {
                tracing::debug!(instance_id = %id, "Expired instance changed before cancel");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get(&self, instance_id: InstanceId) -> Result<Instance, InstanceError> {
        self.repo
            .get(instance_id)
            .await?
            .ok_or(InstanceError::NotFound(instance_id))
    }

    pub async fn find_live(&self, scope: &ScopeKey) -> Result<Option<Instance>, InstanceError> {
        Ok(self.repo.find_live(scope).await?)
    }

    /// Active or Armed instances for a streamer, oldest first.
    pub async fn live_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
        event_id: Option<EventId>,
    ) -> Result<Vec<Instance>, InstanceError> {
        let live = self
            .repo
            .list_live_for_streamer(campaign_id, streamer_id)
            .await?;
        Ok(live
            .into_iter()
            .filter(|i| event_id.map_or(true, |e| i.event_id() == e))
            .collect())
    }

    pub async fn active_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
        event_id: Option<EventId>,
    ) -> Result<Option<Instance>, InstanceError> {
        Ok(self
            .live_for_streamer(campaign_id, streamer_id, event_id)
            .await?
            .into_iter()
            .find(|i| i.status() == InstanceStatus::Active))
    }

    pub async fn armed_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
        event_id: Option<EventId>,
    ) -> Result<Option<Instance>, InstanceError> {
        Ok(self
            .live_for_streamer(campaign_id, streamer_id, event_id)
            .await?
            .into_iter()
            .find(|i| i.status() == InstanceStatus::Armed))
    }

    pub async fn list(
        &self,
        campaign_id: CampaignId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Instance>, InstanceError> {
        Ok(self.repo.list_for_campaign(campaign_id, status).await?)
    }

    pub async fn contributions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Contribution>, InstanceError> {
        Ok(self.repo.list_contributions(instance_id).await?)
    }

    /// The stored instance, provided it has not moved on from `snapshot`.
    async fn current(&self, snapshot: &Instance) -> Result<Instance, InstanceError> {
        let stored = self.get(snapshot.id()).await?;
        if stored.status() != snapshot.status() {
            tracing::debug!(
                instance_id = %snapshot.id(),
                seen = %snapshot.status(),
                stored = %stored.status(),
                "Instance moved on since it was read"
            );
            return Err(InstanceError::Conflict(snapshot.id()));
        }
        Ok(stored)
    }

    async fn persist(
        &self,
        instance: &Instance,
        expected: InstanceStatus,
    ) -> Result<(), InstanceError> {
        if self.repo.save_transition(instance, expected).await? {
            Ok(())
        } else {
            tracing::warn!(
                instance_id = %instance.id(),
                expected = %expected,
                "Lost a concurrent transition"
            );
            Err(InstanceError::Conflict(instance.id()))
        }
    }
}

fn action_context(instance: &Instance, roll: Option<RollContext>) -> ActionContext {
    ActionContext {
        instance_id: instance.id(),
        streamer_id: instance.streamer_id().clone(),
        roll,
    }
}

fn cooldown_end(config: &CampaignEventConfig, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    config.cooldown().map(|span: Duration| now + span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SteppingClock;
    use crate::infrastructure::memory::{InMemoryCooldownRepo, InMemoryInstanceRepo};
    use crate::infrastructure::objective::StandardObjectiveCalculator;
    use crate::infrastructure::ports::{
        MockActionTransportPort, MockInstanceRepo, TransportReply,
    };
    use crate::test_fixtures::{connection_handle, dice_event, draft, event_config, fixed_time};
    use critcast_domain::{CriticalType, TriggerConfig};

    struct Fixture {
        manager: InstanceManager,
        cooldowns: Arc<CooldownTracker>,
        clock: Arc<SteppingClock>,
    }

    fn fixture(transport: MockActionTransportPort) -> Fixture {
        fixture_with_repo(Arc::new(InMemoryInstanceRepo::new()), transport)
    }

    fn fixture_with_repo(
        repo: Arc<dyn InstanceRepo>,
        transport: MockActionTransportPort,
    ) -> Fixture {
        let clock = Arc::new(SteppingClock::new(fixed_time()));
        let cooldowns = Arc::new(CooldownTracker::new(
            Arc::new(InMemoryCooldownRepo::new()),
            clock.clone(),
        ));
        let manager = InstanceManager::new(
            repo,
            Arc::new(StandardObjectiveCalculator),
            Arc::new(ActionExecutor::new(Arc::new(transport))),
            cooldowns.clone(),
            clock.clone(),
        );
        Fixture {
            manager,
            cooldowns,
            clock,
        }
    }

    fn ok_transport() -> MockActionTransportPort {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().returning(|_, _| {
            Ok(TransportReply {
                success: true,
                message: "ok".to_string(),
                payload: serde_json::Value::Null,
            })
        });
        transport
    }

    fn request<'a>(
        event: &'a EventDefinition,
        config: &'a CampaignEventConfig,
        first: Option<ContributionDraft>,
    ) -> CreateInstance<'a> {
        CreateInstance {
            event,
            config,
            streamer_id: StreamerId::new("s1"),
            viewer_count: 0,
            trigger_data: TriggerData::Manual {
                test_mode: false,
                requested_by: None,
            },
            first_contribution: first,
            start_filled: false,
        }
    }

    fn roll(critical: CriticalType) -> RollContext {
        RollContext {
            formula: "1d20".to_string(),
            result: if critical == CriticalType::Success { 20 } else { 1 },
            character_name: Some("Vex".to_string()),
            breakdown: None,
            critical_type: Some(critical),
        }
    }

    #[tokio::test]
    async fn when_scope_is_live_then_second_create_fails() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 3);

        let first = f
            .manager
            .create_individual(request(&event, &config, None))
            .await
            .unwrap();
        let second = f
            .manager
            .create_individual(request(&event, &config, None))
            .await;

        match second {
            Err(InstanceError::AlreadyLive { existing, .. }) => assert_eq!(existing, first.id()),
            other => panic!("expected AlreadyLive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn when_kind_mismatches_then_create_is_rejected() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Group, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 3);

        let result = f
            .manager
            .create_individual(request(&event, &config, None))
            .await;

        assert!(matches!(
            result,
            Err(InstanceError::Domain(DomainError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn first_contribution_is_folded_into_creation() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 3);

        let instance = f
            .manager
            .create_individual(request(&event, &config, Some(draft("r-1", 2))))
            .await
            .unwrap();

        assert_eq!(instance.current_progress(), 2);
        let contributions = f.manager.contributions(instance.id()).await.unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].redemption_id(), "r-1");
    }

    #[tokio::test]
    async fn when_redemption_id_replays_then_progress_is_unchanged() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 5);
        let instance = f
            .manager
            .create_individual(request(&event, &config, None))
            .await
            .unwrap();

        let once = f
            .manager
            .add_contribution(instance.id(), draft("r-1", 2))
            .await
            .unwrap();
        let twice = f
            .manager
            .add_contribution(instance.id(), draft("r-1", 2))
            .await
            .unwrap();

        assert!(!once.duplicate);
        assert!(twice.duplicate);
        assert_eq!(twice.instance.current_progress(), once.instance.current_progress());
        assert_eq!(f.manager.contributions(instance.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn when_instance_expired_then_contribution_is_refused() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 5).with_duration_seconds(60);
        let instance = f
            .manager
            .create_individual(request(&event, &config, None))
            .await
            .unwrap();

        f.clock.advance(Duration::seconds(61));
        assert!(!f.manager.accepts_contributions(&instance));

        let result = f
            .manager
            .add_contribution(instance.id(), draft("r-late", 1))
            .await;
        assert!(matches!(result, Err(InstanceError::NotAccepting { .. })));
    }

    #[tokio::test]
    async fn complete_clamps_progress_and_opens_cooldown() {
        let f = fixture(ok_transport());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &event, 3).with_cooldown_seconds(120);
        let instance = f
            .manager
            .create_individual(request(&event, &config, Some(draft("r-1", 5))))
            .await
            .unwrap();

        let handle = connection_handle(campaign);
        let completed = f
            .manager
            .complete(instance, &event, &config, Some(&handle), true)
            .await
            .unwrap();

        assert_eq!(completed.status(), InstanceStatus::Completed);
        assert_eq!(completed.current_progress(), 3);
        assert!(completed.result_data().unwrap().succeeded());
        let cooldown = f.cooldowns.is_on_cooldown(&completed.scope()).await.unwrap();
        assert_eq!(cooldown.ends_at, Some(fixed_time() + Duration::seconds(120)));
    }

    #[tokio::test]
    async fn when_objective_open_then_complete_never_runs_action() {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().never();
        let f = fixture(transport);
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &event, 3);
        let instance = f
            .manager
            .create_individual(request(&event, &config, None))
            .await
            .unwrap();

        let handle = connection_handle(campaign);
        let result = f
            .manager
            .complete(instance, &event, &config, Some(&handle), true)
            .await;

        assert!(matches!(
            result,
            Err(InstanceError::Domain(DomainError::Constraint(_)))
        ));
    }

    #[tokio::test]
    async fn consume_requires_enabled_critical_side() {
        let f = fixture(ok_transport());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &event, 1);
        let created = f
            .manager
            .create_individual(request(&event, &config, Some(draft("r-1", 1))))
            .await
            .unwrap();
        let armed = f.manager.arm(created).await.unwrap();
        let handle = connection_handle(campaign);

        let refused = f
            .manager
            .consume_armed(
                armed.clone(),
                &event,
                &config,
                Some(&handle),
                roll(CriticalType::Failure),
            )
            .await;
        assert!(refused.is_err());
        assert_eq!(
            f.manager.get(armed.id()).await.unwrap().status(),
            InstanceStatus::Armed
        );

        let consumed = f
            .manager
            .consume_armed(armed, &event, &config, Some(&handle), roll(CriticalType::Success))
            .await
            .unwrap();
        let result = consumed.result_data().unwrap();
        assert_eq!(consumed.status(), InstanceStatus::Completed);
        assert_eq!(result.confirming_roll.as_ref().unwrap().result, 20);
        assert!(!result.immediate);
    }

    #[tokio::test]
    async fn cancel_does_not_start_cooldown() {
        let f = fixture(MockActionTransportPort::new());
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 3).with_cooldown_seconds(300);
        let instance = f
            .manager
            .create_individual(request(&event, &config, None))
            .await
            .unwrap();

        let cancelled = f.manager.cancel(instance.id()).await.unwrap();

        assert_eq!(cancelled.status(), InstanceStatus::Cancelled);
        assert!(!f.cooldowns.is_on_cooldown(&cancelled.scope()).await.unwrap().on_cooldown);
        assert!(f.manager.cancel(instance.id()).await.is_err());
    }

    #[tokio::test]
    async fn expired_sweep_only_touches_elapsed_instances() {
        let f = fixture(MockActionTransportPort::new());
        let campaign = CampaignId::new();
        let short = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let long = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let short_config = event_config(campaign, &short, 3).with_duration_seconds(30);
        let long_config = event_config(campaign, &long, 3).with_duration_seconds(600);

        let expiring = f
            .manager
            .create_individual(request(&short, &short_config, None))
            .await
            .unwrap();
        let fresh = f
            .manager
            .create_individual(request(&long, &long_config, None))
            .await
            .unwrap();

        f.clock.advance(Duration::seconds(31));
        let expired = f.manager.expired_live(campaign).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id(), expiring.id());

        let cancelled = f.manager.cancel_if_expired(expiring.id()).await.unwrap();
        assert_eq!(cancelled.map(|i| i.status()), Some(InstanceStatus::Cancelled));
        assert!(f.manager.cancel_if_expired(fresh.id()).await.unwrap().is_none());
        assert!(f.manager.cancel_if_expired(expiring.id()).await.unwrap().is_none());
        assert_eq!(
            f.manager.get(fresh.id()).await.unwrap().status(),
            InstanceStatus::Active
        );
    }

    #[tokio::test]
    async fn when_armed_copy_is_outdated_then_consume_sends_nothing() {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().times(1).returning(|_, _| {
            Ok(TransportReply {
                success: true,
                message: "ok".to_string(),
                payload: serde_json::Value::Null,
            })
        });
        let f = fixture(transport);
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &event, 1);
        let created = f
            .manager
            .create_individual(request(&event, &config, Some(draft("r-1", 1))))
            .await
            .unwrap();
        let armed = f.manager.arm(created).await.unwrap();
        let handle = connection_handle(campaign);

        f.manager
            .consume_armed(
                armed.clone(),
                &event,
                &config,
                Some(&handle),
                roll(CriticalType::Success),
            )
            .await
            .unwrap();
        let replay = f
            .manager
            .consume_armed(armed, &event, &config, Some(&handle), roll(CriticalType::Success))
            .await;

        assert!(matches!(replay, Err(InstanceError::Conflict(_))));
    }

    #[tokio::test]
    async fn when_cancelled_first_then_complete_sends_nothing() {
        let mut transport = MockActionTransportPort::new();
        transport.expect_send().never();
        let f = fixture(transport);
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let campaign = CampaignId::new();
        let config = event_config(campaign, &event, 1);
        let created = f
            .manager
            .create_individual(request(&event, &config, Some(draft("r-1", 1))))
            .await
            .unwrap();
        f.manager.cancel(created.id()).await.unwrap();

        let handle = connection_handle(campaign);
        let result = f
            .manager
            .complete(created.clone(), &event, &config, Some(&handle), true)
            .await;

        assert!(matches!(result, Err(InstanceError::Conflict(id)) if id == created.id()));
        assert_eq!(
            f.manager.get(created.id()).await.unwrap().status(),
            InstanceStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn when_cas_loses_then_conflict_is_reported() {
        let event = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let config = event_config(CampaignId::new(), &event, 1);
        let mut instance = Instance::start(
            NewInstance {
                campaign_id: config.campaign_id,
                event_id: event.id,
                streamer_id: StreamerId::new("s1"),
                kind: EventKind::Individual,
                objective_target: 1,
                duration: config.duration(),
                viewer_count: 0,
                trigger_data: TriggerData::Manual {
                    test_mode: false,
                    requested_by: None,
                },
            },
            fixed_time(),
        )
        .unwrap();
        instance.add_progress(1, fixed_time()).unwrap();

        let mut repo = MockInstanceRepo::new();
        repo.expect_save_transition().returning(|_, _| Ok(false));
        let f = fixture_with_repo(Arc::new(repo), MockActionTransportPort::new());

        let result = f.manager.arm(instance.clone()).await;
        assert!(matches!(result, Err(InstanceError::Conflict(id)) if id == instance.id()));
    }

    #[tokio::test]
    async fn streamer_queries_split_active_and_armed() {
        let f = fixture(MockActionTransportPort::new());
        let campaign = CampaignId::new();
        let streamer = StreamerId::new("s1");
        let first = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let second = dice_event(EventKind::Individual, TriggerConfig::success_only());
        let first_config = event_config(campaign, &first, 1);
        let second_config = event_config(campaign, &second, 5);

        let to_arm = f
            .manager
            .create_individual(request(&first, &first_config, Some(draft("r-1", 1))))
            .await
            .unwrap();
        f.manager.arm(to_arm.clone()).await.unwrap();
        let active = f
            .manager
            .create_individual(request(&second, &second_config, None))
            .await
            .unwrap();

        let armed = f
            .manager
            .armed_for_streamer(campaign, &streamer, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(armed.id(), to_arm.id());
        assert_eq!(
            f.manager
                .active_for_streamer(campaign, &streamer, None)
                .await
                .unwrap()
                .map(|i| i.id()),
            Some(active.id())
        );
        assert!(f
            .manager
            .active_for_streamer(campaign, &streamer, Some(first.id))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            f.manager
                .live_for_streamer(campaign, &streamer, None)
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
