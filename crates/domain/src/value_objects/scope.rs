//! Scope keys for instances and cooldown windows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EventKind;
use crate::{CampaignId, EventId, StreamerId};

/// Identifies the slot an instance or cooldown occupies.
///
/// Individual events include the streamer; group events are campaign-wide and
/// leave `streamer_id` empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeKey {
    pub campaign_id: CampaignId,
    pub event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamer_id: Option<StreamerId>,
}

impl ScopeKey {
    pub fn new(
        kind: EventKind,
        campaign_id: CampaignId,
        event_id: EventId,
        streamer_id: &StreamerId,
    ) -> Self {
        Self {
            campaign_id,
            event_id,
            streamer_id: kind.is_individual().then(|| streamer_id.clone()),
        }
    }

    pub fn group(campaign_id: CampaignId, event_id: EventId) -> Self {
        Self {
            campaign_id,
            event_id,
            streamer_id: None,
        }
    }

    /// Streamer component used by storage indexes; empty for group scopes.
    pub fn streamer_part(&self) -> &str {
        self.streamer_id.as_ref().map(StreamerId::as_str).unwrap_or("")
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.streamer_id {
            Some(streamer) => write!(f, "{}/{}/{}", self.campaign_id, self.event_id, streamer),
            None => write!(f, "{}/{}", self.campaign_id, self.event_id),
        }
    }
}

/// A creation cooldown that ends at `ends_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownWindow {
    pub scope: ScopeKey,
    pub ends_at: DateTime<Utc>,
}

impl CooldownWindow {
    pub fn new(scope: ScopeKey, ends_at: DateTime<Utc>) -> Self {
        Self { scope, ends_at }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.ends_at > now
    }
}

/// Answer to "is this scope on cooldown right now?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    pub on_cooldown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl CooldownStatus {
    pub fn clear() -> Self {
        Self {
            on_cooldown: false,
            ends_at: None,
        }
    }

    pub fn until(ends_at: DateTime<Utc>) -> Self {
        Self {
            on_cooldown: true,
            ends_at: Some(ends_at),
        }
    }

    pub fn from_window(window: Option<&CooldownWindow>, now: DateTime<Utc>) -> Self {
        match window {
            Some(w) if w.is_active(now) => Self::until(w.ends_at),
            _ => Self::clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn group_scope_drops_streamer() {
        let campaign = CampaignId::new();
        let event = EventId::new();
        let streamer = StreamerId::new("s1");

        let individual = ScopeKey::new(EventKind::Individual, campaign, event, &streamer);
        let group = ScopeKey::new(EventKind::Group, campaign, event, &streamer);

        assert_eq!(individual.streamer_id, Some(streamer));
        assert_eq!(group, ScopeKey::group(campaign, event));
        assert_eq!(group.streamer_part(), "");
    }

    #[test]
    fn expired_window_reports_clear() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        let scope = ScopeKey::group(CampaignId::new(), EventId::new());

        let past = CooldownWindow::new(scope.clone(), now - Duration::seconds(1));
        let future = CooldownWindow::new(scope, now + Duration::seconds(30));

        assert_eq!(CooldownStatus::from_window(Some(&past), now), CooldownStatus::clear());
        assert_eq!(
            CooldownStatus::from_window(Some(&future), now),
            CooldownStatus::until(future.ends_at)
        );
        assert_eq!(CooldownStatus::from_window(None, now), CooldownStatus::clear());
    }
}
