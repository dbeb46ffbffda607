//! Domain entities - catalog records and contributions

mod campaign_event_config;
mod contribution;
mod event_definition;

pub use campaign_event_config::CampaignEventConfig;
pub use contribution::{Contribution, ContributionDraft};
pub use event_definition::{
    ActionConfig, ActionType, CriticalToggle, EventDefinition, EventKind, TriggerConfig,
    TriggerType,
};
