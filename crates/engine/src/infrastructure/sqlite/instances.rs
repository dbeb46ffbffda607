//! SQLite instance and contribution storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::{
    CampaignId, Contribution, ContributionDraft, EventId, Instance, InstanceId, InstanceStatus,
    ScopeKey, StreamerId,
};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};

use super::timestamp;
use crate::infrastructure::ports::{ContributionApplied, InsertOutcome, InstanceRepo, RepoError};

pub struct SqliteInstanceRepo {
    pool: SqlitePool,
}

impl SqliteInstanceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode_instance(row: &SqliteRow) -> Result<Instance, RepoError> {
        let json: String = row
            .try_get("data_json")
            .map_err(|e| RepoError::database("decode_instance", e))?;
        serde_json::from_str(&json).map_err(|e| RepoError::serialization(e.to_string()))
    }

    fn decode_contribution(row: &SqliteRow) -> Result<Contribution, RepoError> {
        let json: String = row
            .try_get("data_json")
            .map_err(|e| RepoError::database("decode_contribution", e))?;
        serde_json::from_str(&json).map_err(|e| RepoError::serialization(e.to_string()))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<String, RepoError> {
        serde_json::to_string(value).map_err(|e| RepoError::serialization(e.to_string()))
    }

    async fn live_in_scope<'e, E>(
        executor: E,
        scope: &ScopeKey,
    ) -> Result<Option<Instance>, RepoError>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            r#"
            SELECT data_json FROM instances
            WHERE campaign_id = ? AND event_id = ? AND scope_streamer = ?
              AND status IN ('active', 'armed')
            "#,
        )
        .bind(scope.campaign_id.to_string())
        .bind(scope.event_id.to_string())
        .bind(scope.streamer_part())
        .fetch_optional(executor)
        .await
        .map_err(|e| RepoError::database("find_live", e))?;

        row.as_ref().map(Self::decode_instance).transpose()
    }

    async fn insert_contribution(
        tx: &mut Transaction<'_, Sqlite>,
        instance: &Instance,
        contribution: &Contribution,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO contributions
                (id, instance_id, campaign_id, event_id, contributor_id, redemption_id,
                 created_at, data_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (instance_id, redemption_id) DO NOTHING
            "#,
        )
        .bind(contribution.id().to_string())
        .bind(instance.id().to_string())
        .bind(instance.campaign_id().to_string())
        .bind(instance.event_id().to_string())
        .bind(contribution.contributor_id())
        .bind(contribution.redemption_id())
        .bind(timestamp(contribution.created_at()))
        .bind(Self::encode(contribution)?)
        .execute(&mut **tx)
        .await
        .map_err(|e| RepoError::database("insert_contribution", e))?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl InstanceRepo for SqliteInstanceRepo {
    async fn get(&self, id: InstanceId) -> Result<Option<Instance>, RepoError> {
        let row = sqlx::query("SELECT data_json FROM instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_instance", e))?;

        row.as_ref().map(Self::decode_instance).transpose()
    }

    async fn find_live(&self, scope: &ScopeKey) -> Result<Option<Instance>, RepoError> {
        Self::live_in_scope(&self.pool, scope).await
    }

    async fn list_live_for_streamer(
        &self,
        campaign_id: CampaignId,
        streamer_id: &StreamerId,
    ) -> Result<Vec<Instance>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT data_json FROM instances
            WHERE campaign_id = ? AND streamer_id = ? AND status IN ('active', 'armed')
            ORDER BY starts_at ASC
            "#,
        )
        .bind(campaign_id.to_string())
        .bind(streamer_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_live_for_streamer", e))?;

        rows.iter().map(Self::decode_instance).collect()
    }

    async fn list_for_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<Instance>, RepoError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT data_json FROM instances
                    WHERE campaign_id = ? AND status = ?
                    ORDER BY starts_at DESC
                    "#,
                )
                .bind(campaign_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT data_json FROM instances WHERE campaign_id = ? ORDER BY starts_at DESC",
                )
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RepoError::database("list_for_campaign", e))?;

        rows.iter().map(Self::decode_instance).collect()
    }

    async fn insert_if_absent(
        &self,
        instance: Instance,
        first: Option<Contribution>,
    ) -> Result<InsertOutcome, RepoError> {
        let scope = instance.scope();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("insert_instance", e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO instances
                (id, campaign_id, event_id, streamer_id, scope_streamer, status, starts_at,
                 data_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(instance.id().to_string())
        .bind(instance.campaign_id().to_string())
        .bind(instance.event_id().to_string())
        .bind(instance.streamer_id().as_str())
        .bind(scope.streamer_part())
        .bind(instance.status().as_str())
        .bind(timestamp(instance.starts_at()))
        .bind(Self::encode(&instance)?)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let existing = Self::live_in_scope(&mut *tx, &scope).await?;
                tx.rollback()
                    .await
                    .map_err(|e| RepoError::database("insert_instance", e))?;
                return match existing {
                    Some(existing) => Ok(InsertOutcome::Occupied(existing)),
                    None => Err(RepoError::constraint(format!(
                        "instance {} conflicts with an existing row",
                        instance.id()
                    ))),
                };
            }
            Err(e) => return Err(RepoError::database("insert_instance", e)),
        }

        if let Some(contribution) = first {
            Self::insert_contribution(&mut tx, &instance, &contribution).await?;
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("insert_instance", e))?;
        Ok(InsertOutcome::Inserted)
    }

    async fn apply_contribution(
        &self,
        instance_id: InstanceId,
        draft: ContributionDraft,
        now: DateTime<Utc>,
    ) -> Result<ContributionApplied, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("apply_contribution", e))?;

        // No-op write so this transaction holds the write lock before it reads
        sqlx::query("UPDATE instances SET id = id WHERE id = ?")
            .bind(instance_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("apply_contribution", e))?;

        let row = sqlx::query("SELECT data_json FROM instances WHERE id = ?")
            .bind(instance_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("apply_contribution", e))?;
        let mut instance = row
            .as_ref()
            .map(Self::decode_instance)
            .transpose()?
            .ok_or_else(|| RepoError::not_found("Instance", instance_id))?;
        let original = instance.clone();

        let seen: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contributions WHERE instance_id = ? AND redemption_id = ?",
        )
        .bind(instance_id.to_string())
        .bind(draft.redemption_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepoError::database("apply_contribution", e))?;

        let outcome = if seen > 0 {
            ContributionApplied::Duplicate { instance: original }
        } else {
            match instance.add_progress(draft.amount(), now) {
                Err(reason) => ContributionApplied::NotAccepting {
                    instance: original,
                    reason,
                },
                Ok(update) => {
                    let contribution = Contribution::record(instance_id, draft, now);
                    Self::insert_contribution(&mut tx, &instance, &contribution).await?;

                    sqlx::query(
                        "UPDATE instances SET data_json = ? WHERE id = ? AND status = 'active'",
                    )
                    .bind(Self::encode(&instance)?)
                    .bind(instance_id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepoError::database("apply_contribution", e))?;

                    tx.commit()
                        .await
                        .map_err(|e| RepoError::database("apply_contribution", e))?;
                    return Ok(ContributionApplied::Applied {
                        instance,
                        objective_reached: update.objective_reached(),
                    });
                }
            }
        };

        tx.rollback()
            .await
            .map_err(|e| RepoError::database("apply_contribution", e))?;
        Ok(outcome)
    }

    async fn save_transition(
        &self,
        instance: &Instance,
        expected: InstanceStatus,
    ) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE instances SET status = ?, data_json = ? WHERE id = ? AND status = ?",
        )
        .bind(instance.status().as_str())
        .bind(Self::encode(instance)?)
        .bind(instance.id().to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_transition", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_contribution(
        &self,
        instance_id: InstanceId,
        redemption_id: &str,
    ) -> Result<Option<Contribution>, RepoError> {
        let row = sqlx::query(
            "SELECT data_json FROM contributions WHERE instance_id = ? AND redemption_id = ?",
        )
        .bind(instance_id.to_string())
        .bind(redemption_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("find_contribution", e))?;

        row.as_ref().map(Self::decode_contribution).transpose()
    }

    async fn list_contributions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Contribution>, RepoError> {
        let rows = sqlx::query(
            "SELECT data_json FROM contributions WHERE instance_id = ? ORDER BY created_at ASC",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_contributions", e))?;

        rows.iter().map(Self::decode_contribution).collect()
    }

    async fn count_contributions_since(
        &self,
        campaign_id: CampaignId,
        event_id: EventId,
        contributor_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepoError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM contributions
            WHERE campaign_id = ? AND event_id = ? AND contributor_id = ? AND created_at >= ?
            "#,
        )
        .bind(campaign_id.to_string())
        .bind(event_id.to_string())
        .bind(contributor_id)
        .bind(timestamp(since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::database("count_contributions", e))?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::connect;
    use crate::test_fixtures::{fixed_time, new_instance, new_instance_input};
    use chrono::Duration;
    use critcast_domain::EventKind;

    async fn repo() -> (SqliteInstanceRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("critcast.db");
        let pool = connect(path.to_str().unwrap()).await.unwrap();
        (SqliteInstanceRepo::new(pool), dir)
    }

    fn draft(redemption: &str, contributor: &str, amount: u32) -> ContributionDraft {
        ContributionDraft::new(
            StreamerId::new("s1"),
            contributor,
            "Viewer",
            amount,
            redemption,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn partial_index_allows_one_live_instance_per_scope() {
        let (repo, _dir) = repo().await;
        let first = new_instance(EventKind::Individual, 3);
        let scope = first.scope();
        let second = Instance::start(
            new_instance_input(scope.campaign_id, scope.event_id, EventKind::Individual, 3),
            fixed_time(),
        )
        .unwrap();

        assert!(matches!(
            repo.insert_if_absent(first.clone(), None).await.unwrap(),
            InsertOutcome::Inserted
        ));
        match repo.insert_if_absent(second.clone(), None).await.unwrap() {
            InsertOutcome::Occupied(existing) => assert_eq!(existing.id(), first.id()),
            InsertOutcome::Inserted => panic!("expected Occupied"),
        }

        // Once the first is terminal, the scope frees up
        let mut cancelled = first.clone();
        cancelled.cancel(fixed_time()).unwrap();
        assert!(repo
            .save_transition(&cancelled, InstanceStatus::Active)
            .await
            .unwrap());
        assert!(matches!(
            repo.insert_if_absent(second, None).await.unwrap(),
            InsertOutcome::Inserted
        ));
    }

    #[tokio::test]
    async fn first_contribution_is_stored_with_the_instance() {
        let (repo, _dir) = repo().await;
        let mut instance = new_instance(EventKind::Individual, 3);
        instance.add_progress(2, fixed_time()).unwrap();
        let first = Contribution::record(instance.id(), draft("r-1", "v1", 2), fixed_time());

        repo.insert_if_absent(instance.clone(), Some(first))
            .await
            .unwrap();

        let stored = repo.get(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored.current_progress(), 2);
        assert!(repo
            .find_contribution(instance.id(), "r-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn replayed_redemption_does_not_double_count() {
        let (repo, _dir) = repo().await;
        let instance = new_instance(EventKind::Individual, 5);
        let id = instance.id();
        repo.insert_if_absent(instance, None).await.unwrap();

        for _ in 0..2 {
            repo.apply_contribution(id, draft("r-1", "v1", 2), fixed_time())
                .await
                .unwrap();
        }

        let stored = repo.get(id).await.unwrap().unwrap();
        assert_eq!(stored.current_progress(), 2);
        assert_eq!(repo.list_contributions(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn counts_contributions_per_viewer_since_a_point_in_time() {
        let (repo, _dir) = repo().await;
        let instance = new_instance(EventKind::Individual, 10);
        let (campaign, event, id) = (instance.campaign_id(), instance.event_id(), instance.id());
        repo.insert_if_absent(instance, None).await.unwrap();

        repo.apply_contribution(id, draft("r-1", "v1", 1), fixed_time())
            .await
            .unwrap();
        repo.apply_contribution(id, draft("r-2", "v1", 1), fixed_time() + Duration::seconds(10))
            .await
            .unwrap();
        repo.apply_contribution(id, draft("r-3", "v2", 1), fixed_time() + Duration::seconds(10))
            .await
            .unwrap();

        let since = fixed_time() + Duration::seconds(5);
        assert_eq!(
            repo.count_contributions_since(campaign, event, "v1", since)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            repo.count_contributions_since(campaign, event, "v1", fixed_time())
                .await
                .unwrap(),
            2
        );
    }
}
