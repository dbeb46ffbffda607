//! Event catalog entries.
//!
//! An `EventDefinition` describes *what* a gamification event does: how it is
//! triggered and which game-table action fires when its objective is reached.
//! Definitions are authored by administration tooling and are read-only at
//! runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value_objects::CriticalType;
use crate::EventId;

/// Whether an event is scoped to a single streamer or shared by the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// One instance per streamer; cooldowns are per streamer.
    Individual,
    /// One instance per campaign; cooldowns are campaign-wide.
    Group,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Individual => "individual",
            EventKind::Group => "group",
        }
    }

    pub fn is_individual(&self) -> bool {
        matches!(self, EventKind::Individual)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = crate::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(EventKind::Individual),
            "group" => Ok(EventKind::Group),
            other => Err(crate::DomainError::parse(format!("Unknown event kind: {other}"))),
        }
    }
}

/// How a new instance of the event gets started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A critical roll at the game table starts an instance.
    DiceCritical,
    /// Only viewer redemptions or an operator start an instance.
    Manual,
}

/// The game-table effect executed when the objective is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SpellDisable,
    SpellBuff,
    SpellDebuff,
    MonsterBuff,
    MonsterDebuff,
    Custom,

    /// Forward-compatibility fallback for newer catalog entries.
    #[serde(other)]
    Unknown,
}

impl ActionType {
    /// Immediate actions execute as soon as the objective is reached.
    ///
    /// Everything else arms the instance and waits for a confirming
    /// critical roll.
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            ActionType::SpellDisable
                | ActionType::MonsterBuff
                | ActionType::MonsterDebuff
                | ActionType::Custom
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SpellDisable => "spell_disable",
            ActionType::SpellBuff => "spell_buff",
            ActionType::SpellDebuff => "spell_debuff",
            ActionType::MonsterBuff => "monster_buff",
            ActionType::MonsterDebuff => "monster_debuff",
            ActionType::Custom => "custom",
            ActionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enablement flag for one side of a critical roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalToggle {
    #[serde(default)]
    pub enabled: bool,
}

/// Which critical roll types start or confirm this event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    #[serde(default)]
    pub critical_success: CriticalToggle,
    #[serde(default)]
    pub critical_failure: CriticalToggle,
}

impl TriggerConfig {
    pub fn new(success: bool, failure: bool) -> Self {
        Self {
            critical_success: CriticalToggle { enabled: success },
            critical_failure: CriticalToggle { enabled: failure },
        }
    }

    pub fn success_only() -> Self {
        Self::new(true, false)
    }

    pub fn failure_only() -> Self {
        Self::new(false, true)
    }

    pub fn accepts(&self, critical: CriticalType) -> bool {
        match critical {
            CriticalType::Success => self.critical_success.enabled,
            CriticalType::Failure => self.critical_failure.enabled,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.critical_success.enabled || self.critical_failure.enabled
    }
}

/// Action-specific parameters.
///
/// Known parameters are typed; anything else a catalog entry carries is kept
/// in `extra` and forwarded untouched (used by `custom` actions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    /// How long the effect lasts at the table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    /// Magnitude of a bonus/penalty (sign comes from the action type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<i32>,
    /// Number of rolls a spell modifier applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<u32>,
    /// Specific spell to target; `None` lets the table pick one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spell: Option<String>,
    /// Monster stat to modify (e.g. "ac", "attack", "damage")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<String>,
    /// Hostile target selector (e.g. "all_hostile", "nearest")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A catalog entry describing one gamification event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub id: EventId,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub trigger_type: TriggerType,
    pub action_type: ActionType,
    #[serde(default)]
    pub trigger_config: TriggerConfig,
    #[serde(default)]
    pub action_config: ActionConfig,
}

impl EventDefinition {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        kind: EventKind,
        trigger_type: TriggerType,
        action_type: ActionType,
    ) -> Self {
        Self {
            id: EventId::new(),
            slug: slug.into(),
            name: name.into(),
            kind,
            trigger_type,
            action_type,
            trigger_config: TriggerConfig::default(),
            action_config: ActionConfig::default(),
        }
    }

    pub fn with_trigger_config(mut self, trigger_config: TriggerConfig) -> Self {
        self.trigger_config = trigger_config;
        self
    }

    pub fn with_action_config(mut self, action_config: ActionConfig) -> Self {
        self.action_config = action_config;
        self
    }

    pub fn is_dice_triggered(&self) -> bool {
        matches!(self.trigger_type, TriggerType::DiceCritical)
    }

    /// Whether an instance that reaches its objective should arm and wait
    /// for a confirming roll instead of executing straight away.
    ///
    /// A non-immediate action with no enabled critical side could never be
    /// confirmed, so it executes immediately.
    pub fn requires_confirmation(&self) -> bool {
        !self.action_type.is_immediate() && self.trigger_config.any_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spell_buff() -> EventDefinition {
        EventDefinition::new(
            "arcane-surge",
            "Arcane Surge",
            EventKind::Individual,
            TriggerType::DiceCritical,
            ActionType::SpellBuff,
        )
        .with_trigger_config(TriggerConfig::success_only())
    }

    #[test]
    fn immediate_set_matches_action_types() {
        assert!(ActionType::SpellDisable.is_immediate());
        assert!(ActionType::MonsterBuff.is_immediate());
        assert!(ActionType::MonsterDebuff.is_immediate());
        assert!(ActionType::Custom.is_immediate());
        assert!(!ActionType::SpellBuff.is_immediate());
        assert!(!ActionType::SpellDebuff.is_immediate());
        assert!(!ActionType::Unknown.is_immediate());
    }

    #[test]
    fn trigger_config_accepts_only_enabled_side() {
        let config = TriggerConfig::success_only();
        assert!(config.accepts(CriticalType::Success));
        assert!(!config.accepts(CriticalType::Failure));
        assert!(!TriggerConfig::default().any_enabled());
    }

    #[test]
    fn requires_confirmation_needs_an_enabled_side() {
        assert!(spell_buff().requires_confirmation());

        let unconfirmable = spell_buff().with_trigger_config(TriggerConfig::default());
        assert!(!unconfirmable.requires_confirmation());
    }

    #[test]
    fn deserializes_catalog_json() {
        let json = r#"{
            "id": "6f1c1d1e-8a43-4f0e-9a43-1f1e3c0b2a11",
            "slug": "curse-the-caster",
            "name": "Curse the Caster",
            "type": "individual",
            "triggerType": "dice_critical",
            "actionType": "spell_debuff",
            "triggerConfig": { "criticalFailure": { "enabled": true } },
            "actionConfig": { "modifier": 2, "uses": 1, "flavor": "hexed" }
        }"#;

        let event: EventDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Individual);
        assert_eq!(event.action_type, ActionType::SpellDebuff);
        assert!(event.trigger_config.accepts(CriticalType::Failure));
        assert!(!event.trigger_config.accepts(CriticalType::Success));
        assert_eq!(event.action_config.modifier, Some(2));
        assert_eq!(
            event.action_config.extra.get("flavor"),
            Some(&serde_json::json!("hexed"))
        );
    }

    #[test]
    fn unknown_action_types_fall_back() {
        let action: ActionType = serde_json::from_str("\"summon_dragon\"").unwrap();
        assert_eq!(action, ActionType::Unknown);
    }
}
