//! Critcast domain - catalog records, the instance state machine, and the
//! value objects shared by the engine and its adapters.

extern crate self as critcast_domain;

pub mod aggregates;
pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod value_objects;

pub use aggregates::{Instance, InstanceStatus, NewInstance};

pub use entities::{
    ActionConfig, ActionType, CampaignEventConfig, Contribution, ContributionDraft,
    CriticalToggle, EventDefinition, EventKind, TriggerConfig, TriggerType,
};

pub use error::DomainError;
pub use events::{InstanceSnapshot, InstanceUpdate, LifecycleEvent};

pub use ids::{CampaignId, ContributionId, EventId, InstanceId, StreamerId};

pub use value_objects::{
    ActionResult, CooldownStatus, CooldownWindow, CriticalType, DiceRoll, ResultData,
    RollContext, ScopeKey, TriggerData,
};
