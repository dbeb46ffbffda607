//! Context captured when an instance starts and when it resolves.

use serde::{Deserialize, Serialize};

use super::RollContext;

/// Structured result of executing an action at the game table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ActionResult {
    pub fn success(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// How an instance came to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TriggerData {
    /// Started by a critical roll at the table
    DiceRoll { roll: RollContext },
    /// Started by the first viewer redemption
    Redemption {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reward_id: Option<String>,
        contributor_name: String,
    },
    /// Started by an operator
    Manual {
        test_mode: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requested_by: Option<String>,
    },
}

/// Outcome recorded on completion or consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    pub action: ActionResult,
    /// Whether the action ran without waiting for a confirming roll
    pub immediate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirming_roll: Option<RollContext>,
}

impl ResultData {
    pub fn immediate(action: ActionResult) -> Self {
        Self {
            action,
            immediate: true,
            confirming_roll: None,
        }
    }

    pub fn confirmed(action: ActionResult, roll: RollContext) -> Self {
        Self {
            action,
            immediate: false,
            confirming_roll: Some(roll),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.action.success
    }
}
