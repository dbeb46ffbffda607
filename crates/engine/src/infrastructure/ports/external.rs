//! External service port traits (game table, health probe, overlays).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::{CampaignEventConfig, CampaignId, LifecycleEvent};
use serde::{Deserialize, Serialize};

use super::error::{HealthProbeError, TransportError};

// =============================================================================
// Objective sizing
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ObjectiveCalculator: Send + Sync {
    /// Objective target for a new instance. Always at least 1.
    fn compute(&self, viewer_count: u32, config: &CampaignEventConfig) -> u32;
}

// =============================================================================
// Game table
// =============================================================================

/// Where commands for a campaign's game table are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHandle {
    pub campaign_id: CampaignId,
    pub endpoint: String,
    pub connected_at: DateTime<Utc>,
}

/// A command sent to the game table when an instance resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GameCommand {
    DisableSpell {
        #[serde(skip_serializing_if = "Option::is_none")]
        character: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        spell: Option<String>,
        duration_seconds: u32,
    },
    ModifySpellRoll {
        #[serde(skip_serializing_if = "Option::is_none")]
        character: Option<String>,
        modifier: i32,
        uses: u32,
        duration_seconds: u32,
    },
    ModifyMonster {
        target: String,
        stat: String,
        modifier: i32,
        duration_seconds: u32,
    },
    Custom {
        name: String,
        payload: serde_json::Value,
    },
}

impl GameCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            GameCommand::DisableSpell { .. } => "disable_spell",
            GameCommand::ModifySpellRoll { .. } => "modify_spell_roll",
            GameCommand::ModifyMonster { .. } => "modify_monster",
            GameCommand::Custom { .. } => "custom",
        }
    }
}

/// What the game table answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportReply {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionTransportPort: Send + Sync {
    async fn send(
        &self,
        command: &GameCommand,
        handle: &ConnectionHandle,
    ) -> Result<TransportReply, TransportError>;

    /// Cheap reachability check used by the full health probe.
    async fn ping(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait GameTableConnectionsPort: Send + Sync {
    fn handle_for(&self, campaign_id: CampaignId) -> Option<ConnectionHandle>;
    fn register(&self, handle: ConnectionHandle);
    fn unregister(&self, campaign_id: CampaignId) -> bool;
}

// =============================================================================
// Health probe
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Advisory; never blocks a trigger
    Light,
    /// Blocking; an unhealthy report refuses the trigger
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthProbeRequest {
    pub campaign_id: CampaignId,
    pub event_type: String,
    pub mode: ProbeMode,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthCheck {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            detail: None,
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            detail: Some(detail.into()),
        }
    }

    pub fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Healthy unless any check failed. Warnings do not gate triggers.
    pub fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let healthy = checks.iter().all(|c| c.status != CheckStatus::Fail);
        Self { healthy, checks }
    }

    pub fn failing_checks(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| c.name.clone())
            .collect()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbePort: Send + Sync {
    async fn run(&self, request: HealthProbeRequest) -> Result<HealthReport, HealthProbeError>;
}

// =============================================================================
// Overlay broadcast
// =============================================================================

/// Fire-and-forget: an event nobody is listening for is simply dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastPort: Send + Sync {
    async fn publish(&self, campaign_id: CampaignId, event: LifecycleEvent);
}
