//! Decides whether a dice roll starts an event.

use critcast_domain::{DiceRoll, EventDefinition, TriggerData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvaluation {
    pub should_trigger: bool,
    /// Sanitized roll context to keep on the new instance
    pub trigger_data: Option<TriggerData>,
}

impl TriggerEvaluation {
    fn skip() -> Self {
        Self {
            should_trigger: false,
            trigger_data: None,
        }
    }
}

/// Pure matcher between catalog events and critical rolls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// A roll triggers an event only when the event is dice-triggered, the
    /// roll is a well-formed critical and that critical side is enabled.
    pub fn evaluate(&self, event: &EventDefinition, roll: &DiceRoll) -> TriggerEvaluation {
        if !event.is_dice_triggered() {
            return TriggerEvaluation::skip();
        }
        let Some(critical) = roll.critical() else {
            return TriggerEvaluation::skip();
        };
        if roll.formula.trim().is_empty() {
            return TriggerEvaluation::skip();
        }
        if !event.trigger_config.accepts(critical) {
            return TriggerEvaluation::skip();
        }

        TriggerEvaluation {
            should_trigger: true,
            trigger_data: Some(TriggerData::DiceRoll {
                roll: roll.context(),
            }),
        }
    }
}
