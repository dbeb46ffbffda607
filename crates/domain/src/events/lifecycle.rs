//! Lifecycle notifications pushed to viewer overlays.
//!
//! Snapshots carry only the public-safe subset of an instance. Redemption
//! ids and contributor platform ids never leave the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregates::instance::InstanceStatus;
use crate::entities::EventKind;
use crate::value_objects::{RollContext, TriggerData};
use crate::{CampaignId, EventId, InstanceId, StreamerId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub campaign_id: CampaignId,
    pub event_id: EventId,
    pub streamer_id: StreamerId,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub status: InstanceStatus,
    pub objective_target: u32,
    pub current_progress: u32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    pub trigger: TriggerData,
}

/// A lifecycle transition worth showing to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Created {
        instance: InstanceSnapshot,
    },
    ProgressUpdated {
        instance: InstanceSnapshot,
        amount: u32,
        #[serde(rename = "contributorName")]
        contributor_name: String,
    },
    Armed {
        instance: InstanceSnapshot,
    },
    Consumed {
        instance: InstanceSnapshot,
        roll: RollContext,
    },
    Completed {
        instance: InstanceSnapshot,
        success: bool,
        message: String,
    },
    Cancelled {
        instance: InstanceSnapshot,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Created { .. } => "created",
            LifecycleEvent::ProgressUpdated { .. } => "progress_updated",
            LifecycleEvent::Armed { .. } => "armed",
            LifecycleEvent::Consumed { .. } => "consumed",
            LifecycleEvent::Completed { .. } => "completed",
            LifecycleEvent::Cancelled { .. } => "cancelled",
        }
    }

    pub fn instance(&self) -> &InstanceSnapshot {
        match self {
            LifecycleEvent::Created { instance }
            | LifecycleEvent::ProgressUpdated { instance, .. }
            | LifecycleEvent::Armed { instance }
            | LifecycleEvent::Consumed { instance, .. }
            | LifecycleEvent::Completed { instance, .. }
            | LifecycleEvent::Cancelled { instance } => instance,
        }
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.instance().campaign_id
    }
}
