//! In-memory instance and contribution storage.
//!
//! A single async mutex guards both maps, so every check-and-write below is
//! one critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::{
    CampaignId, Contribution, ContributionDraft, EventId, Instance, InstanceId, InstanceStatus,
    ScopeKey, StreamerId,
};
use tokio::sync::Mutex;

use crate::infrastructure::ports::{ContributionApplied, InsertOutcome, InstanceRepo, RepoError};

#[derive(Default)]
struct State {
    instances: HashMap<InstanceId, Instance>,
    contributions: HashMap<InstanceId, Vec<Contribution>>,
}

impl State {
    fn live_in_scope(&self, scope: &ScopeKey) -> Option<&Instance> {
        self.instances
            .values()
            .find(|i| i.is_live() && &i.scope() == scope)
    }
}

#[derive(Default)]
pub struct InMemoryInstanceRepo {
    state: Mutex<State>,
}

impl InMemoryInstanceRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepo for InMemoryInstanceRepo {
    async fn get(&self, id: InstanceId) -> Result<Option<Instance>, RepoError> {
        Ok(self.state.lock().await.instances.get(&id).cloned())
    }

    async fn find_live(&self, scope: &ScopeKey) -> Result<Option<Instance>, RepoError> {
        Ok(self.state.lock().await.live_in_scope(scope).cloned())
    }

    async fn list_live_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
    ) -> Result<Vec<Instance>, RepoError> {
        let state = self.state.lock().await;
        let mut live: Vec<_> = state
            .instances
            .values()
            .filter(|i| {
                i.is_live() && i.campaign_id() == campaign_id && i.streamer_id() == streamer_id
            })
            .cloned()
            .collect();
        live.sort_by_key(|i| i.starts_at());
        Ok(live)
    }

    async fn list_for_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Instance>, RepoError> {
        let state = self.state.lock().await;
        let mut instances: Vec<_> = state
            .instances
            .values()
            .filter(|i| i.campaign_id() == campaign_id)
            .filter(|i| status.map_or(true, |s| i.status() == s))
            .cloned()
            .collect();
        instances.sort_by(|a, b| b.starts_at().cmp(&a.starts_at()));
        Ok(instances)
    }

    async fn insert_if_absent(
        &self,
        instance: Instance,
        first: Option<Contribution>,
    ) -> Result<InsertOutcome, RepoError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.live_in_scope(&instance.scope()) {
            return Ok(InsertOutcome::Occupied(existing.clone()));
        }
        if state.instances.contains_key(&instance.id()) {
            return Err(RepoError::constraint(format!(
                "instance {} already exists",
                instance.id()
            )));
        }

        let id = instance.id();
        state.instances.insert(id, instance);
        state
            .contributions
            .insert(id, first.into_iter().collect());
        Ok(InsertOutcome::Inserted)
    }

    async fn apply_contribution(
        &self,
        instance_id: InstanceId,
        draft: ContributionDraft,
        now: DateTime<Utc>,
    ) -> Result<ContributionApplied, RepoError> {
        let mut state = self.state.lock().await;
        let State {
            instances,
            contributions,
        } = &mut *state;

        let instance = instances
            .get_mut(&instance_id)
            .ok_or_else(|| RepoError::not_found("Instance", instance_id))?;
        let recorded = contributions.entry(instance_id).or_default();

        if recorded
            .iter()
            .any(|c| c.redemption_id() == draft.redemption_id())
        {
            return Ok(ContributionApplied::Duplicate {
                instance: instance.clone(),
            });
        }

        // Mutate a copy so a refused contribution leaves storage untouched
        let mut updated = instance.clone();
        let update = match updated.add_progress(draft.amount(), now) {
            Ok(update) => update,
            Err(reason) => {
                return Ok(ContributionApplied::NotAccepting {
                    instance: instance.clone(),
                    reason,
                })
            }
        };

        recorded.push(Contribution::record(instance_id, draft, now));
        *instance = updated.clone();

        Ok(ContributionApplied::Applied {
            instance: updated,
            objective_reached: update.objective_reached(),
        })
    }

    async fn save_transition(
        &self,
        instance: &Instance,
        expected: InstanceStatus,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let stored = state
            .instances
            .get_mut(&instance.id())
            .ok_or_else(|| RepoError::not_found("Instance", instance.id()))?;

        if stored.status() != expected {
            return Ok(false);
        }
        *stored = instance.clone();
        Ok(true)
    }

    async fn find_contribution(
        &self,
        instance_id: InstanceId,
        redemption_id: &str,
    ) -> Result<Option<Contribution>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.contributions.get(&instance_id).and_then(|list| {
            list.iter()
                .find(|c| c.redemption_id() == redemption_id)
                .cloned()
        }))
    }

    async fn list_contributions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Contribution>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .contributions
            .get(&instance_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_contributions_since(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
        contributor_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepoError> {
        let state = self.state.lock().await;
        let count = state
            .instances
            .values()
            .filter(|i| i.campaign_id() == campaign_id && i.event_id() == event_id)
            .filter_map(|i| state.contributions.get(&i.id()))
            .flatten()
            .filter(|c| c.contributor_id() == contributor_id && c.created_at() >= since)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
