//! Inbound signals and the outcomes the coordinator reports for them.

use chrono::{DateTime, Utc};
use critcast_domain::{
    ActionResult, CampaignId, EventId, Instance, InstanceId, InstanceStatus, StreamerId,
};
use serde::{Deserialize, Serialize};

fn default_amount() -> u32 {
    1
}

/// A viewer reward redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub campaign_id: CampaignId,
    pub streamer_id: StreamerId,
    /// Platform reward id; required for per-event binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_id: Option<String>,
    /// Idempotency key from the platform
    pub redemption_id: String,
    pub contributor_id: String,
    pub contributor_name: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default)]
    pub viewer_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Advisory probe in the background
    #[default]
    Standard,
    /// Blocking probe; an unhealthy report refuses the trigger
    Gated,
    /// No probe, no cooldown check, no cooldown written
    Test,
}

/// An operator firing an event directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTrigger {
    pub campaign_id: CampaignId,
    pub event_id: EventId,
    pub streamer_id: StreamerId,
    #[serde(default)]
    pub mode: TriggerMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub viewer_count: u32,
}

/// Why a signal was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// No enabled config binds the signal to an event
    NotConfigured,
    OnCooldown { ends_at: DateTime<Utc> },
    /// A live instance already occupies the scope
    InstanceLive { instance_id: InstanceId },
    /// The instance is armed or finished
    InstanceClosed {
        instance_id: InstanceId,
        status: InstanceStatus,
    },
    InstanceExpired { instance_id: InstanceId },
    UserLimitReached { limit: u32 },
    InvalidContribution { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiceRollOutcome {
    /// An armed instance was resolved by this roll
    Consumed {
        instance: Instance,
        action: ActionResult,
    },
    /// A new instance was started by this roll
    Created { instance: Instance },
    /// Nothing matched
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    /// Progress added; the objective is still open
    Contributed { instance: Instance, created: bool },
    /// Objective reached and the action waits for a confirming roll
    Armed { instance: Instance, created: bool },
    /// Objective reached and the action ran
    Completed {
        instance: Instance,
        action: ActionResult,
        created: bool,
    },
    /// The redemption id was already counted
    Duplicate { instance: Instance },
    /// Not processed; the caller may refund the redemption
    Rejected { reason: RejectReason },
}

impl RedemptionOutcome {
    pub fn is_armed(&self) -> bool {
        matches!(self, RedemptionOutcome::Armed { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, RedemptionOutcome::Rejected { .. })
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            RedemptionOutcome::Contributed { instance, .. }
            | RedemptionOutcome::Armed { instance, .. }
            | RedemptionOutcome::Completed { instance, .. }
            | RedemptionOutcome::Duplicate { instance } => Some(instance),
            RedemptionOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ManualTriggerOutcome {
    Completed {
        instance: Instance,
        action: ActionResult,
    },
    Rejected {
        reason: RejectReason,
    },
    /// The blocking probe refused the trigger
    Unhealthy {
        failing_checks: Vec<String>,
    },
}

/// Result of starting a campaign session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub campaign_id: CampaignId,
    pub started_at: DateTime<Utc>,
    pub cooldowns_cleared: u64,
}
