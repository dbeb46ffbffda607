//! Gamification: dice-triggered and viewer-funded events at the game table.

mod action_executor;
mod cooldown;
mod error;
mod instances;
mod service;
mod trigger;
mod types;

pub use action_executor::{ActionContext, ActionExecutor, NO_CONNECTION, UNSUPPORTED_ACTION};
pub use cooldown::CooldownTracker;
pub use error::{GamificationError, InstanceError};
pub use instances::{ContributionResult, CreateInstance, InstanceManager};
pub use service::GamificationService;
pub use trigger::{TriggerEvaluation, TriggerEvaluator};
pub use types::{
    DiceRollOutcome, ManualTrigger, ManualTriggerOutcome, Redemption, RedemptionOutcome,
    RejectReason, SessionStarted, TriggerMode,
};
