//! SQLite-backed storage.
//!
//! Instances are stored as JSON alongside the columns the engine filters on.
//! Atomicity comes from the schema:
//! - a partial unique index allows one live instance per scope
//! - `(instance_id, redemption_id)` is unique on contributions

mod cooldowns;
mod instances;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::infrastructure::ports::RepoError;

pub use cooldowns::{SqliteCooldownRepo, SqliteSessionRepo};
pub use instances::SqliteInstanceRepo;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS instances (
        id TEXT PRIMARY KEY,
        campaign_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        streamer_id TEXT NOT NULL,
        scope_streamer TEXT NOT NULL,
        status TEXT NOT NULL,
        starts_at TEXT NOT NULL,
        data_json TEXT NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_instances_live_scope
        ON instances (campaign_id, event_id, scope_streamer)
        WHERE status IN ('active', 'armed')
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_instances_campaign
        ON instances (campaign_id, status)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contributions (
        id TEXT PRIMARY KEY,
        instance_id TEXT NOT NULL REFERENCES instances (id),
        campaign_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        contributor_id TEXT NOT NULL,
        redemption_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        data_json TEXT NOT NULL,
        UNIQUE (instance_id, redemption_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_contributions_contributor
        ON contributions (campaign_id, event_id, contributor_id, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cooldown_windows (
        campaign_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        scope_streamer TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        PRIMARY KEY (campaign_id, event_id, scope_streamer)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaign_sessions (
        campaign_id TEXT PRIMARY KEY,
        started_at TEXT NOT NULL
    )
    "#,
];

/// Open (creating if needed) the database and ensure the schema exists.
pub async fn connect(db_path: &str) -> Result<SqlitePool, RepoError> {
    let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await
        .map_err(|e| RepoError::database("connect", e))?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .map_err(|e| RepoError::database("schema", e))?;
    }

    Ok(pool)
}

/// Fixed-width UTC timestamps so string comparison matches time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepoError::serialization(format!("bad timestamp {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn timestamps_sort_lexically() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap();
        let a = timestamp(base);
        let b = timestamp(base + Duration::milliseconds(5));
        let c = timestamp(base + Duration::seconds(1));
        assert!(a < b && b < c);
        assert_eq!(parse_timestamp(&b).unwrap(), base + Duration::milliseconds(5));
    }
}
