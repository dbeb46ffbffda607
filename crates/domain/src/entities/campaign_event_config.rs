//! Per-campaign activation of a catalog event.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{CampaignId, EventId};

fn default_enabled() -> bool {
    true
}

fn default_coefficient() -> f64 {
    0.1
}

fn default_minimum_objective() -> u32 {
    1
}

fn default_duration_seconds() -> u32 {
    300
}

/// Campaign-level settings for one event.
///
/// # Invariants
///
/// - At most one config exists per (campaign_id, event_id); the catalog store
///   is keyed on that pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignEventConfig {
    pub campaign_id: CampaignId,
    pub event_id: EventId,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    /// Reward cost in channel points (informational for the engine)
    #[serde(default)]
    pub cost: u32,
    /// Fraction of current viewers the objective should require
    #[serde(default = "default_coefficient")]
    pub objective_coefficient: f64,
    #[serde(default = "default_minimum_objective")]
    pub minimum_objective: u32,
    /// Lifetime of an instance once started
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u32,
    /// Creation cooldown after completion; zero disables it
    #[serde(default)]
    pub cooldown_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_clicks_per_user_per_session: Option<u32>,
    /// Platform reward bound to this event (per-event binding)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reward_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CampaignEventConfig {
    pub fn new(campaign_id: CampaignId, event_id: EventId, created_at: DateTime<Utc>) -> Self {
        Self {
            campaign_id,
            event_id,
            is_enabled: default_enabled(),
            cost: 0,
            objective_coefficient: default_coefficient(),
            minimum_objective: default_minimum_objective(),
            duration_seconds: default_duration_seconds(),
            cooldown_seconds: 0,
            max_clicks_per_user_per_session: None,
            external_reward_id: None,
            created_at,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    pub fn with_objective(mut self, coefficient: f64, minimum: u32) -> Self {
        self.objective_coefficient = coefficient;
        self.minimum_objective = minimum;
        self
    }

    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_cooldown_seconds(mut self, seconds: u32) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    pub fn with_click_limit(mut self, limit: u32) -> Self {
        self.max_clicks_per_user_per_session = Some(limit);
        self
    }

    pub fn with_reward(mut self, reward_id: impl Into<String>) -> Self {
        self.external_reward_id = Some(reward_id.into());
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.duration_seconds))
    }

    /// Cooldown span, or `None` when cooldowns are disabled.
    pub fn cooldown(&self) -> Option<Duration> {
        (self.cooldown_seconds > 0).then(|| Duration::seconds(i64::from(self.cooldown_seconds)))
    }

    pub fn matches_reward(&self, reward_id: &str) -> bool {
        self.external_reward_id.as_deref() == Some(reward_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    #[test]
    fn zero_cooldown_is_disabled() {
        let config = CampaignEventConfig::new(CampaignId::new(), EventId::new(), now());
        assert!(config.cooldown().is_none());

        let config = config.with_cooldown_seconds(90);
        assert_eq!(config.cooldown(), Some(Duration::seconds(90)));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let json = format!(
            r#"{{"campaignId":"{}","eventId":"{}","createdAt":"2025-03-01T20:00:00Z"}}"#,
            CampaignId::new(),
            EventId::new()
        );
        let config: CampaignEventConfig = serde_json::from_str(&json).unwrap();
        assert!(config.is_enabled);
        assert_eq!(config.minimum_objective, 1);
        assert_eq!(config.duration_seconds, 300);
        assert!(config.external_reward_id.is_none());
    }

    #[test]
    fn reward_binding_matches_exact_id() {
        let config =
            CampaignEventConfig::new(CampaignId::new(), EventId::new(), now()).with_reward("rw-1");
        assert!(config.matches_reward("rw-1"));
        assert!(!config.matches_reward("rw-2"));
    }
}
