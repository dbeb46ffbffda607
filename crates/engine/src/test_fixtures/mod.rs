//! Shared builders for engine tests.
//!
//! Everything here is deterministic: ids are fresh per call but times come
//! from `fixed_time()`, and defaults favour small objectives so tests can
//! reach them with one or two contributions.

use chrono::{DateTime, TimeZone, Utc};
use critcast_domain::{
    ActionType, CampaignEventConfig, CampaignId, ContributionDraft, CriticalType, DiceRoll,
    EventDefinition, EventId, EventKind, Instance, NewInstance, StreamerId, TriggerConfig,
    TriggerData, TriggerType,
};

use crate::infrastructure::ports::ConnectionHandle;
use crate::use_cases::gamification::Redemption;

pub const TABLE_ENDPOINT: &str = "http://table.local";

/// Saturday evening session start.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
}

// =============================================================================
// Catalog
// =============================================================================

/// A dice-triggered spell buff; arms on objective and waits for a roll.
pub fn dice_event(kind: EventKind, trigger_config: TriggerConfig) -> EventDefinition {
    event_with_action(kind, trigger_config, ActionType::SpellBuff)
}

pub fn event_with_action(
    kind: EventKind,
    trigger_config: TriggerConfig,
    action_type: ActionType,
) -> EventDefinition {
    EventDefinition::new(
        "arcane-surge",
        "Arcane Surge",
        kind,
        TriggerType::DiceCritical,
        action_type,
    )
    .with_trigger_config(trigger_config)
}

/// Config whose objective is exactly `target` regardless of audience.
pub fn event_config(
    campaign_id: CampaignId,
    event: &EventDefinition,
    target: u32,
) -> CampaignEventConfig {
    CampaignEventConfig::new(campaign_id, event.id, fixed_time()).with_objective(0.0, target)
}

// =============================================================================
// Instances and contributions
// =============================================================================

pub fn new_instance_input(
    campaign_id: CampaignId,
    event_id: EventId,
    kind: EventKind,
    objective_target: u32,
) -> NewInstance {
    NewInstance {
        campaign_id,
        event_id,
        streamer_id: StreamerId::new("s1"),
        kind,
        objective_target,
        duration: chrono::Duration::seconds(300),
        viewer_count: 10,
        trigger_data: TriggerData::Manual {
            test_mode: false,
            requested_by: None,
        },
    }
}

/// A fresh Active instance started at `fixed_time()`.
pub fn new_instance(kind: EventKind, objective_target: u32) -> Instance {
    Instance::start(
        new_instance_input(CampaignId::new(), EventId::new(), kind, objective_target),
        fixed_time(),
    )
    .unwrap()
}

pub fn draft(redemption_id: &str, amount: u32) -> ContributionDraft {
    ContributionDraft::new(
        StreamerId::new("s1"),
        "viewer-1",
        "Viewer One",
        amount,
        redemption_id,
    )
    .unwrap()
}

// =============================================================================
// Signals
// =============================================================================

pub fn critical_roll(
    campaign_id: CampaignId,
    streamer_id: StreamerId,
    critical: Option<CriticalType>,
) -> DiceRoll {
    DiceRoll {
        campaign_id,
        streamer_id,
        is_critical: critical.is_some(),
        critical_type: critical,
        formula: "1d20+5".to_string(),
        result: match critical {
            Some(CriticalType::Failure) => 6,
            _ => 25,
        },
        character_name: Some("Vex".to_string()),
        breakdown: Some("20 + 5".to_string()),
        viewer_count: 10,
    }
}

/// A one-point redemption from `viewer-1` on streamer `s1`.
pub fn redemption(campaign_id: CampaignId, redemption_id: &str) -> Redemption {
    Redemption {
        campaign_id,
        streamer_id: StreamerId::new("s1"),
        reward_id: None,
        redemption_id: redemption_id.to_string(),
        contributor_id: "viewer-1".to_string(),
        contributor_name: "Viewer One".to_string(),
        amount: 1,
        viewer_count: 10,
    }
}

pub fn connection_handle(campaign_id: CampaignId) -> ConnectionHandle {
    ConnectionHandle {
        campaign_id,
        endpoint: TABLE_ENDPOINT.to_string(),
        connected_at: fixed_time(),
    }
}
