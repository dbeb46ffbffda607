//! Instance aggregate - one live or historical occurrence of an event
//!
//! An instance accumulates viewer progress toward an objective and resolves
//! into a game-table action. Depending on the event's action type it either
//! completes as soon as the objective is reached or arms and waits for a
//! confirming critical roll.
//!
//! ```text
//!   start ──► Active ──(objective, immediate)──────────► Completed
//!               │  └──(objective, needs confirmation)──► Armed ──(consume)──► Completed
//!               └──(cancel)──► Cancelled ◄──(cancel)──────┘
//! ```
//!
//! # Rustic DDD Design
//!
//! - **Private fields**: state only changes through transition methods
//! - **Monotonic**: no method returns an instance to `Active`
//! - **Domain behavior**: transitions return `InstanceUpdate` describing the change

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EventKind;
use crate::events::{InstanceSnapshot, InstanceUpdate};
use crate::value_objects::{ResultData, ScopeKey, TriggerData};
use crate::{CampaignId, DomainError, EventId, InstanceId, StreamerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    Armed,
    Completed,
    Cancelled,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Armed => "armed",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
        }
    }

    /// Live instances occupy their scope; at most one may exist per scope.
    pub fn is_live(&self) -> bool {
        matches!(self, InstanceStatus::Active | InstanceStatus::Armed)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InstanceStatus::Active),
            "armed" => Ok(InstanceStatus::Armed),
            "completed" => Ok(InstanceStatus::Completed),
            "cancelled" => Ok(InstanceStatus::Cancelled),
            other => Err(DomainError::parse(format!("Unknown instance status: {other}"))),
        }
    }
}

/// Inputs for starting a new instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub campaign_id: CampaignId,
    pub event_id: EventId,
    pub streamer_id: StreamerId,
    pub kind: EventKind,
    pub objective_target: u32,
    pub duration: Duration,
    pub viewer_count: u32,
    pub trigger_data: TriggerData,
}

/// A gamification instance.
///
/// # Invariants
///
/// - `current_progress` only grows while `Active`, and is clamped to
///   `objective_target` by the transition that completes the instance
/// - `armed_at`, `completed_at`, `cancelled_at` and `cooldown_ends_at` are
///   written once, by the transition that produces them
/// - `expires_at == starts_at + duration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    id: InstanceId,
    campaign_id: CampaignId,
    event_id: EventId,
    streamer_id: StreamerId,
    kind: EventKind,
    status: InstanceStatus,

    objective_target: u32,
    current_progress: u32,

    starts_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    armed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cooldown_ends_at: Option<DateTime<Utc>>,

    viewer_count_at_start: u32,
    trigger_data: TriggerData,
    result_data: Option<ResultData>,
}

impl Instance {
    // =========================================================================
    // Constructor
    // =========================================================================

    pub fn start(new: NewInstance, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if new.objective_target == 0 {
            return Err(DomainError::validation("objective target must be at least 1"));
        }
        if new.duration < Duration::zero() {
            return Err(DomainError::validation("instance duration cannot be negative"));
        }

        Ok(Self {
            id: InstanceId::new(),
            campaign_id: new.campaign_id,
            event_id: new.event_id,
            streamer_id: new.streamer_id,
            kind: new.kind,
            status: InstanceStatus::Active,
            objective_target: new.objective_target,
            current_progress: 0,
            starts_at: now,
            expires_at: now + new.duration,
            armed_at: None,
            completed_at: None,
            cancelled_at: None,
            cooldown_ends_at: None,
            viewer_count_at_start: new.viewer_count,
            trigger_data: new.trigger_data,
            result_data: None,
        })
    }

    // =========================================================================
    // Read-only accessors
    // =========================================================================

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn streamer_id(&self) -> &StreamerId {
        &self.streamer_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn objective_target(&self) -> u32 {
        self.objective_target
    }

    pub fn current_progress(&self) -> u32 {
        self.current_progress
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn armed_at(&self) -> Option<DateTime<Utc>> {
        self.armed_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cooldown_ends_at(&self) -> Option<DateTime<Utc>> {
        self.cooldown_ends_at
    }

    pub fn viewer_count_at_start(&self) -> u32 {
        self.viewer_count_at_start
    }

    pub fn trigger_data(&self) -> &TriggerData {
        &self.trigger_data
    }

    pub fn result_data(&self) -> Option<&ResultData> {
        self.result_data.as_ref()
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.kind, self.campaign_id, self.event_id, &self.streamer_id)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Only unexpired `Active` instances take contributions.
    pub fn accepts_contributions(&self, now: DateTime<Utc>) -> bool {
        self.status == InstanceStatus::Active && !self.is_expired(now)
    }

    pub fn objective_reached(&self) -> bool {
        self.current_progress >= self.objective_target
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id,
            campaign_id: self.campaign_id,
            event_id: self.event_id,
            streamer_id: self.streamer_id.clone(),
            kind: self.kind,
            status: self.status,
            objective_target: self.objective_target,
            current_progress: self.current_progress,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            armed_at: self.armed_at,
            completed_at: self.completed_at,
            cooldown_ends_at: self.cooldown_ends_at,
            trigger: self.trigger_data.clone(),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Add viewer progress.
    ///
    /// Progress may overshoot the objective here; it is normalized when the
    /// instance completes.
    pub fn add_progress(
        &mut self,
        amount: u32,
        now: DateTime<Utc>,
    ) -> Result<InstanceUpdate, DomainError> {
        if self.status != InstanceStatus::Active {
            return Err(DomainError::invalid_state_transition(
                "contribute to",
                self.status,
            ));
        }
        if self.is_expired(now) {
            return Err(DomainError::constraint("instance has expired"));
        }
        if amount == 0 {
            return Err(DomainError::validation("contribution amount must be positive"));
        }

        let from = self.current_progress;
        self.current_progress = from.saturating_add(amount);

        Ok(InstanceUpdate::ProgressAdded {
            amount,
            from,
            to: self.current_progress,
            objective_reached: self.objective_reached(),
        })
    }

    /// Jump straight to the objective (operator-triggered instances).
    pub fn fill_objective(&mut self) -> Result<InstanceUpdate, DomainError> {
        if self.status != InstanceStatus::Active {
            return Err(DomainError::invalid_state_transition("fill", self.status));
        }
        let from = self.current_progress;
        self.current_progress = from.max(self.objective_target);
        Ok(InstanceUpdate::ProgressAdded {
            amount: self.current_progress - from,
            from,
            to: self.current_progress,
            objective_reached: true,
        })
    }

    /// Objective reached; wait for a confirming roll.
    pub fn arm(&mut self, now: DateTime<Utc>) -> Result<InstanceUpdate, DomainError> {
        if self.status != InstanceStatus::Active {
            return Err(DomainError::invalid_state_transition("arm", self.status));
        }
        if !self.objective_reached() {
            return Err(DomainError::constraint(format!(
                "objective not reached ({}/{})",
                self.current_progress, self.objective_target
            )));
        }

        self.status = InstanceStatus::Armed;
        self.armed_at = Some(now);
        Ok(InstanceUpdate::Armed { at: now })
    }

    /// Complete an `Active` instance whose objective has been reached.
    pub fn complete(
        &mut self,
        result: ResultData,
        cooldown_ends_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<InstanceUpdate, DomainError> {
        self.ensure_completable()?;
        Ok(self.finish(result, cooldown_ends_at, now))
    }

    /// Resolve an `Armed` instance with a confirming roll.
    pub fn consume(
        &mut self,
        result: ResultData,
        cooldown_ends_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<InstanceUpdate, DomainError> {
        self.ensure_consumable()?;
        Ok(self.finish(result, cooldown_ends_at, now))
    }

    /// Guard for `complete`, checked before any side effect runs.
    pub fn ensure_completable(&self) -> Result<(), DomainError> {
        if self.status != InstanceStatus::Active {
            return Err(DomainError::invalid_state_transition("complete", self.status));
        }
        if !self.objective_reached() {
            return Err(DomainError::constraint(format!(
                "objective not reached ({}/{})",
                self.current_progress, self.objective_target
            )));
        }
        Ok(())
    }

    /// Guard for `consume`, checked before any side effect runs.
    pub fn ensure_consumable(&self) -> Result<(), DomainError> {
        if self.status != InstanceStatus::Armed {
            return Err(DomainError::invalid_state_transition("consume", self.status));
        }
        Ok(())
    }

    /// Administrative cancellation. Never starts a cooldown.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<InstanceUpdate, DomainError> {
        if !self.status.is_live() {
            return Err(DomainError::invalid_state_transition("cancel", self.status));
        }
        let from = self.status;
        self.status = InstanceStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(InstanceUpdate::Cancelled { at: now, from })
    }

    fn finish(
        &mut self,
        result: ResultData,
        cooldown_ends_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> InstanceUpdate {
        let from = self.status;
        let success = result.succeeded();

        self.current_progress = self.current_progress.min(self.objective_target);
        self.status = InstanceStatus::Completed;
        self.completed_at = Some(now);
        self.cooldown_ends_at = cooldown_ends_at;
        self.result_data = Some(result);

        InstanceUpdate::Completed {
            at: now,
            from,
            success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{ActionResult, CriticalType, RollContext};
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    fn new_instance(target: u32) -> Instance {
        Instance::start(
            NewInstance {
                campaign_id: CampaignId::new(),
                event_id: EventId::new(),
                streamer_id: StreamerId::new("streamer-1"),
                kind: EventKind::Individual,
                objective_target: target,
                duration: Duration::seconds(300),
                viewer_count: 40,
                trigger_data: TriggerData::Redemption {
                    reward_id: Some("reward-1".to_string()),
                    contributor_name: "viewer".to_string(),
                },
            },
            fixed_time(),
        )
        .unwrap()
    }

    fn roll() -> RollContext {
        RollContext {
            formula: "1d20".to_string(),
            result: 20,
            character_name: Some("Vex".to_string()),
            breakdown: None,
            critical_type: Some(CriticalType::Success),
        }
    }

    mod constructor {
        use super::*;

        #[test]
        fn starts_active_with_expiry() {
            let instance = new_instance(3);
            assert_eq!(instance.status(), InstanceStatus::Active);
            assert_eq!(instance.current_progress(), 0);
            assert_eq!(instance.expires_at(), fixed_time() + Duration::seconds(300));
            assert!(instance.armed_at().is_none());
            assert!(instance.result_data().is_none());
        }

        #[test]
        fn rejects_zero_objective() {
            let mut new = NewInstance {
                campaign_id: CampaignId::new(),
                event_id: EventId::new(),
                streamer_id: StreamerId::new("s"),
                kind: EventKind::Group,
                objective_target: 0,
                duration: Duration::seconds(60),
                viewer_count: 0,
                trigger_data: TriggerData::Manual {
                    test_mode: true,
                    requested_by: None,
                },
            };
            assert!(Instance::start(new.clone(), fixed_time()).is_err());
            new.objective_target = 1;
            assert!(Instance::start(new, fixed_time()).is_ok());
        }

        #[test]
        fn group_scope_ignores_streamer() {
            let instance = Instance::start(
                NewInstance {
                    campaign_id: CampaignId::new(),
                    event_id: EventId::new(),
                    streamer_id: StreamerId::new("s"),
                    kind: EventKind::Group,
                    objective_target: 5,
                    duration: Duration::seconds(60),
                    viewer_count: 0,
                    trigger_data: TriggerData::Manual {
                        test_mode: false,
                        requested_by: None,
                    },
                },
                fixed_time(),
            )
            .unwrap();
            assert!(instance.scope().streamer_id.is_none());
        }
    }

    mod progress {
        use super::*;

        #[test]
        fn reports_objective_reached_at_or_over_target() {
            let mut instance = new_instance(3);
            let update = instance.add_progress(2, fixed_time()).unwrap();
            assert!(!update.objective_reached());
            assert_eq!(instance.current_progress(), 2);

            let update = instance.add_progress(2, fixed_time()).unwrap();
            assert!(update.objective_reached());
            assert_eq!(instance.current_progress(), 4);
        }

        #[test]
        fn rejects_after_expiry() {
            let mut instance = new_instance(3);
            let later = fixed_time() + Duration::seconds(301);
            assert!(!instance.accepts_contributions(later));
            assert!(matches!(
                instance.add_progress(1, later),
                Err(DomainError::Constraint(_))
            ));
        }

        #[test]
        fn rejects_when_armed() {
            let mut instance = new_instance(1);
            instance.add_progress(1, fixed_time()).unwrap();
            instance.arm(fixed_time()).unwrap();

            assert!(!instance.accepts_contributions(fixed_time()));
            let err = instance.add_progress(1, fixed_time()).unwrap_err();
            assert!(err.is_invalid_transition());
        }

        #[test]
        fn fill_objective_never_lowers_progress() {
            let mut instance = new_instance(3);
            instance.add_progress(5, fixed_time()).unwrap();
            instance.fill_objective().unwrap();
            assert_eq!(instance.current_progress(), 5);
        }
    }

    mod transitions {
        use super::*;

        #[test]
        fn arm_requires_objective() {
            let mut instance = new_instance(3);
            assert!(matches!(
                instance.arm(fixed_time()),
                Err(DomainError::Constraint(_))
            ));

            instance.add_progress(3, fixed_time()).unwrap();
            instance.arm(fixed_time()).unwrap();
            assert_eq!(instance.status(), InstanceStatus::Armed);
            assert_eq!(instance.armed_at(), Some(fixed_time()));
        }

        #[test]
        fn complete_clamps_progress_and_sets_cooldown() {
            let mut instance = new_instance(3);
            instance.add_progress(7, fixed_time()).unwrap();

            let cooldown_end = fixed_time() + Duration::seconds(60);
            let update = instance
                .complete(
                    ResultData::immediate(ActionResult::failure("no game-table connection")),
                    Some(cooldown_end),
                    fixed_time(),
                )
                .unwrap();

            assert!(matches!(update, InstanceUpdate::Completed { success: false, .. }));
            assert_eq!(instance.status(), InstanceStatus::Completed);
            assert_eq!(instance.current_progress(), 3);
            assert_eq!(instance.cooldown_ends_at(), Some(cooldown_end));
            assert!(!instance.result_data().unwrap().succeeded());
        }

        #[test]
        fn consume_only_from_armed() {
            let mut instance = new_instance(1);
            instance.add_progress(1, fixed_time()).unwrap();

            let result = ResultData::confirmed(
                ActionResult::success("applied", serde_json::Value::Null),
                roll(),
            );
            let err = instance
                .consume(result.clone(), None, fixed_time())
                .unwrap_err();
            assert!(err.is_invalid_transition());

            instance.arm(fixed_time()).unwrap();
            instance.consume(result, None, fixed_time()).unwrap();
            assert_eq!(instance.status(), InstanceStatus::Completed);
            assert_eq!(
                instance.result_data().unwrap().confirming_roll,
                Some(roll())
            );
        }

        #[test]
        fn complete_rejects_armed_instances() {
            let mut instance = new_instance(1);
            instance.add_progress(1, fixed_time()).unwrap();
            instance.arm(fixed_time()).unwrap();

            let err = instance
                .complete(
                    ResultData::immediate(ActionResult::failure("x")),
                    None,
                    fixed_time(),
                )
                .unwrap_err();
            assert!(err.is_invalid_transition());
        }

        #[test]
        fn cancel_is_terminal_and_leaves_no_cooldown() {
            let mut instance = new_instance(3);
            instance.cancel(fixed_time()).unwrap();

            assert_eq!(instance.status(), InstanceStatus::Cancelled);
            assert!(instance.cooldown_ends_at().is_none());
            assert!(instance.cancel(fixed_time()).unwrap_err().is_invalid_transition());
            assert!(instance.arm(fixed_time()).unwrap_err().is_invalid_transition());
        }

        #[test]
        fn completed_instance_cannot_be_cancelled() {
            let mut instance = new_instance(1);
            instance.fill_objective().unwrap();
            instance
                .complete(
                    ResultData::immediate(ActionResult::success("ok", serde_json::Value::Null)),
                    None,
                    fixed_time(),
                )
                .unwrap();

            assert!(instance.cancel(fixed_time()).unwrap_err().is_invalid_transition());
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let instance = new_instance(3);
        let json = serde_json::to_value(instance.snapshot()).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["type"], "individual");
        assert_eq!(json["trigger"]["source"], "redemption");
        assert!(json.get("resultData").is_none());
    }
}
