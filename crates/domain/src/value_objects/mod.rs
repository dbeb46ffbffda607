//! Value objects - Immutable objects defined by their attributes

mod dice_roll;
mod outcome_data;
mod scope;

pub use dice_roll::{CriticalType, DiceRoll, RollContext, MAX_ROLL_TEXT_LEN};
pub use outcome_data::{ActionResult, ResultData, TriggerData};
pub use scope::{CooldownStatus, CooldownWindow, ScopeKey};
