//! Dice roll signals from the game table.
//!
//! The game table reports every roll; only critical rolls matter to the
//! engine. `RollContext` is the sanitized subset kept on instances and shown
//! on overlays.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CampaignId, StreamerId};

/// Longest text kept from any roll field.
pub const MAX_ROLL_TEXT_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalType {
    Success,
    Failure,
}

impl CriticalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalType::Success => "success",
            CriticalType::Failure => "failure",
        }
    }
}

impl fmt::Display for CriticalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dice roll reported by the game table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRoll {
    pub campaign_id: CampaignId,
    pub streamer_id: StreamerId,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_type: Option<CriticalType>,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub result: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<String>,
    /// Audience size when the roll happened; sizes objectives of new instances
    #[serde(default)]
    pub viewer_count: u32,
}

impl DiceRoll {
    /// The critical side of this roll, if it is a well-formed critical.
    ///
    /// A roll flagged critical without a type, or typed without the flag, is
    /// treated as non-critical.
    pub fn critical(&self) -> Option<CriticalType> {
        if self.is_critical {
            self.critical_type
        } else {
            None
        }
    }

    pub fn context(&self) -> RollContext {
        RollContext {
            formula: sanitize(&self.formula),
            result: self.result,
            character_name: self.character_name.as_deref().map(sanitize),
            breakdown: self.breakdown.as_deref().map(sanitize),
            critical_type: self.critical(),
        }
    }
}

/// Display-safe copy of roll metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollContext {
    pub formula: String,
    pub result: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_type: Option<CriticalType>,
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .take(MAX_ROLL_TEXT_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}
