//! SQLite cooldown windows and session markers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use critcast_domain::{CampaignId, CooldownWindow, ScopeKey, StreamerId};
use sqlx::{Row, SqlitePool};

use super::{parse_timestamp, timestamp};
use crate::infrastructure::ports::{CooldownRepo, RepoError, SessionRepo};

pub struct SqliteCooldownRepo {
    pool: SqlitePool,
}

impl SqliteCooldownRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownRepo for SqliteCooldownRepo {
    async fn get(&self, scope: &ScopeKey) -> Result<Option<CooldownWindow>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT ends_at FROM cooldown_windows
            WHERE campaign_id = ? AND event_id = ? AND scope_streamer = ?
            "#,
        )
        .bind(scope.campaign_id.to_string())
        .bind(scope.event_id.to_string())
        .bind(scope.streamer_part())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("get_cooldown", e))?;

        match row {
            Some(row) => {
                let ends_at: String = row
                    .try_get("ends_at")
                    .map_err(|e| RepoError::database("get_cooldown", e))?;
                Ok(Some(CooldownWindow::new(
                    scope.clone(),
                    parse_timestamp(&ends_at)?,
                )))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, window: &CooldownWindow) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO cooldown_windows (campaign_id, event_id, scope_streamer, ends_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (campaign_id, event_id, scope_streamer) DO UPDATE SET
                ends_at = excluded.ends_at
            "#,
        )
        .bind(window.scope.campaign_id.to_string())
        .bind(window.scope.event_id.to_string())
        .bind(window.scope.streamer_part())
        .bind(timestamp(window.ends_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("upsert_cooldown", e))?;

        Ok(())
    }

    async fn clear(
        &self,
        campaign_id: CampaignId,
        streamer_id: Option<StreamerId>,
    ) -> Result<u64, RepoError> {
        let result = match streamer_id {
            Some(streamer) => {
                sqlx::query(
                    "DELETE FROM cooldown_windows WHERE campaign_id = ? AND scope_streamer = ?",
                )
                .bind(campaign_id.to_string())
                .bind(streamer.as_str().to_string())
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM cooldown_windows WHERE campaign_id = ?")
                    .bind(campaign_id.to_string())
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| RepoError::database("clear_cooldowns", e))?;

        Ok(result.rows_affected())
    }
}

pub struct SqliteSessionRepo {
    pool: SqlitePool,
}

impl SqliteSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepo for SqliteSessionRepo {
    async fn started_at(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<DateTime<Utc>>, RepoError> {
        let started: Option<String> =
            sqlx::query_scalar("SELECT started_at FROM campaign_sessions WHERE campaign_id = ?")
                .bind(campaign_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::database("session_started_at", e))?;

        started.as_deref().map(parse_timestamp).transpose()
    }

    async fn start(&self, campaign_id: CampaignId, at: DateTime<Utc>) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO campaign_sessions (campaign_id, started_at) VALUES (?, ?)
            ON CONFLICT (campaign_id) DO UPDATE SET started_at = excluded.started_at
            "#,
        )
        .bind(campaign_id.to_string())
        .bind(timestamp(at))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("session_start", e))?;

        Ok(())
    }
}
