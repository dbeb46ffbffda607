//! Viewer contributions toward an instance objective.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContributionId, DomainError, InstanceId, StreamerId};

/// A contribution that has not been attached to an instance yet.
///
/// Redemptions are turned into drafts before the coordinator knows whether
/// they will start a new instance or advance an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionDraft {
    streamer_id: StreamerId,
    contributor_id: String,
    contributor_name: String,
    amount: u32,
    redemption_id: String,
}

impl ContributionDraft {
    pub fn new(
        streamer_id: StreamerId,
        contributor_id: impl Into<String>,
        contributor_name: impl Into<String>,
        amount: u32,
        redemption_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let redemption_id = redemption_id.into();
        if amount == 0 {
            return Err(DomainError::validation("contribution amount must be positive"));
        }
        if redemption_id.trim().is_empty() {
            return Err(DomainError::validation("redemption id cannot be empty"));
        }
        Ok(Self {
            streamer_id,
            contributor_id: contributor_id.into(),
            contributor_name: contributor_name.into(),
            amount,
            redemption_id,
        })
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn redemption_id(&self) -> &str {
        &self.redemption_id
    }

    pub fn contributor_id(&self) -> &str {
        &self.contributor_id
    }

    pub fn contributor_name(&self) -> &str {
        &self.contributor_name
    }

    pub fn streamer_id(&self) -> &StreamerId {
        &self.streamer_id
    }
}

/// Append-only record of one accumulation event.
///
/// # Invariants
///
/// - `redemption_id` is unique per instance; stores reject replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    id: ContributionId,
    instance_id: InstanceId,
    streamer_id: StreamerId,
    contributor_id: String,
    contributor_name: String,
    amount: u32,
    redemption_id: String,
    created_at: DateTime<Utc>,
}

impl Contribution {
    pub fn record(instance_id: InstanceId, draft: ContributionDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: ContributionId::new(),
            instance_id,
            streamer_id: draft.streamer_id,
            contributor_id: draft.contributor_id,
            contributor_name: draft.contributor_name,
            amount: draft.amount,
            redemption_id: draft.redemption_id,
            created_at: now,
        }
    }

    pub fn id(&self) -> ContributionId {
        self.id
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn streamer_id(&self) -> &StreamerId {
        &self.streamer_id
    }

    pub fn contributor_id(&self) -> &str {
        &self.contributor_id
    }

    pub fn contributor_name(&self) -> &str {
        &self.contributor_name
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn redemption_id(&self) -> &str {
        &self.redemption_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_amount() {
        let err = ContributionDraft::new(StreamerId::new("s1"), "u1", "viewer", 0, "r1")
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_blank_redemption_id() {
        let err = ContributionDraft::new(StreamerId::new("s1"), "u1", "viewer", 1, "  ")
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn record_keeps_draft_fields() {
        let draft =
            ContributionDraft::new(StreamerId::new("s1"), "u1", "viewer", 3, "r1").unwrap();
        let instance_id = InstanceId::new();
        let contribution = Contribution::record(instance_id, draft, chrono::Utc::now());

        assert_eq!(contribution.instance_id(), instance_id);
        assert_eq!(contribution.amount(), 3);
        assert_eq!(contribution.redemption_id(), "r1");
        assert_eq!(contribution.contributor_name(), "viewer");
    }
}
