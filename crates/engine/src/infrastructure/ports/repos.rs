//! Repository port traits for catalog and instance storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::*;

use super::error::RepoError;

// =============================================================================
// Catalog (read-only)
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventCatalogRepo: Send + Sync {
    async fn get_event(&self, id: EventId) -> Result<Option<EventDefinition>, RepoError>;
    async fn list_events(&self) -> Result<Vec<EventDefinition>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignConfigRepo: Send + Sync {
    async fn get_config(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
    ) -> Result<Option<CampaignEventConfig>, RepoError>;

    /// Enabled configs for a campaign, oldest first.
    async fn list_enabled(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignEventConfig>, RepoError>;

    /// The enabled config bound to an external reward, if any.
    async fn find_by_reward(
        &self,
        campaign_id: CampaignId,
        reward_id: &str,
    ) -> Result<Option<CampaignEventConfig>, RepoError>;
}

// =============================================================================
// Instances and contributions
// =============================================================================

/// Result of an insert-if-absent on a scope.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted,
    /// Another live instance already holds the scope
    Occupied(Instance),
}

/// Result of applying a contribution atomically with its idempotency check.
#[derive(Debug, Clone)]
pub enum ContributionApplied {
    Applied {
        instance: Instance,
        objective_reached: bool,
    },
    /// The redemption id was already recorded; nothing changed
    Duplicate { instance: Instance },
    /// The instance refused the contribution (not active, or expired)
    NotAccepting {
        instance: Instance,
        reason: DomainError,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceRepo: Send + Sync {
    async fn get(&self, id: InstanceId) -> Result<Option<Instance>, RepoError>;

    /// The Active or Armed instance occupying a scope.
    async fn find_live(&self, scope: &ScopeKey) -> Result<Option<Instance>, RepoError>;

    async fn list_live_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
    ) -> Result<Vec<Instance>, RepoError>;

    /// Newest first.
    async fn list_for_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Instance>, RepoError>;

    /// Insert a new live instance unless its scope is occupied.
    ///
    /// `first` is recorded in the same atomic step; its amount must already
    /// be reflected in the instance's progress.
    async fn insert_if_absent(
        &self,
        instance: Instance,
        first: Option<Contribution>,
    ) -> Result<InsertOutcome, RepoError>;

    /// Check the redemption id, add progress and record the contribution as
    /// one atomic step.
    async fn apply_contribution(
        &self,
        instance_id: InstanceId,
        draft: ContributionDraft,
        now: DateTime<Utc>,
    ) -> Result<ContributionApplied, RepoError>;

    /// Persist a transitioned instance if its stored status is still
    /// `expected`. Returns `false` when another writer got there first.
    async fn save_transition(
        &self,
        instance: &Instance,
        expected: InstanceStatus,
    ) -> Result<bool, RepoError>;

    async fn find_contribution(
        &self,
        instance_id: InstanceId,
        redemption_id: &str,
    ) -> Result<Option<Contribution>, RepoError>;

    async fn list_contributions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Contribution>, RepoError>;

    /// Contributions by one viewer to one event since `since`, across all
    /// instances of that event in the campaign.
    async fn count_contributions_since(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
        contributor_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepoError>;
}

// =============================================================================
// Cooldowns and sessions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CooldownRepo: Send + Sync {
    async fn get(&self, scope: &ScopeKey) -> Result<Option<CooldownWindow>, RepoError>;
    async fn upsert(&self, window: &CooldownWindow) -> Result<(), RepoError>;

    /// Remove windows for a campaign, optionally only one streamer's.
    /// Returns how many were removed.
    async fn clear(
        &self,
        campaign_id: CampaignId,
        streamer_id: Option<StreamerId>,
    ) -> Result<u64, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn started_at(&self, campaign_id: CampaignId)
        -> Result<Option<DateTime<Utc>>, RepoError>;
    async fn start(&self, campaign_id: CampaignId, at: DateTime<Utc>) -> Result<(), RepoError>;
}
