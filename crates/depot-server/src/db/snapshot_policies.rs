//! Snapshot policy rows

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::SnapshotPolicy;

#[derive(Debug, Clone)]
pub struct NewSnapshotPolicy {
    pub name: String,
    pub dataset: String,
    pub schedule: String,
    pub retention: i64,
    pub prefix: String,
    pub recursive: bool,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotPolicyPatch {
    pub schedule: Option<String>,
    pub retention: Option<i64>,
    pub prefix: Option<String>,
    pub recursive: Option<bool>,
    pub enabled: Option<bool>,
}

pub async fn create(pool: &SqlitePool, new: NewSnapshotPolicy) -> Result<SnapshotPolicy, DbError> {
    let now = Utc::now();
    let policy = SnapshotPolicy {
        id: Uuid::new_v4(),
        name: new.name,
        dataset: new.dataset,
        schedule: new.schedule,
        retention: new.retention,
        prefix: new.prefix,
        recursive: new.recursive,
        enabled: true,
        last_run: None,
        next_run: new.next_run,
        last_error: None,
        snapshot_count: 0,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO snapshot_policies (id, name, dataset, schedule, retention, prefix,
                                       recursive, enabled, last_run, next_run, last_error,
                                       snapshot_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(policy.id)
    .bind(&policy.name)
    .bind(&policy.dataset)
    .bind(&policy.schedule)
    .bind(policy.retention)
    .bind(&policy.prefix)
    .bind(policy.recursive)
    .bind(policy.enabled)
    .bind(policy.last_run)
    .bind(policy.next_run)
    .bind(&policy.last_error)
    .bind(policy.snapshot_count)
    .bind(policy.created_at)
    .bind(policy.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "snapshot policy"))?;

    Ok(policy)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<SnapshotPolicy, DbError> {
    sqlx::query_as::<_, SnapshotPolicy>("SELECT * FROM snapshot_policies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("snapshot policy".into()))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<SnapshotPolicy>, DbError> {
    Ok(
        sqlx::query_as::<_, SnapshotPolicy>("SELECT * FROM snapshot_policies ORDER BY name")
            .fetch_all(pool)
            .await?,
    )
}

/// Enabled policies due at or before `now`.
pub async fn list_due(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<SnapshotPolicy>, DbError> {
    Ok(sqlx::query_as::<_, SnapshotPolicy>(
        "SELECT * FROM snapshot_policies WHERE enabled = 1 AND next_run IS NOT NULL AND next_run <= ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await?)
}

pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    patch: SnapshotPolicyPatch,
) -> Result<SnapshotPolicy, DbError> {
    let mut policy = get(pool, id).await?;

    if let Some(schedule) = patch.schedule {
        policy.schedule = schedule;
    }
    if let Some(retention) = patch.retention {
        policy.retention = retention;
    }
    if let Some(prefix) = patch.prefix {
        policy.prefix = prefix;
    }
    if let Some(recursive) = patch.recursive {
        policy.recursive = recursive;
    }
    if let Some(enabled) = patch.enabled {
        policy.enabled = enabled;
    }
    policy.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE snapshot_policies
        SET schedule = ?, retention = ?, prefix = ?, recursive = ?, enabled = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&policy.schedule)
    .bind(policy.retention)
    .bind(&policy.prefix)
    .bind(policy.recursive)
    .bind(policy.enabled)
    .bind(policy.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(policy)
}

/// Record the outcome of one firing: timestamps, error text, the recomputed
/// next_run, and the post-retention snapshot count.
pub async fn record_run(
    pool: &SqlitePool,
    id: Uuid,
    last_run: DateTime<Utc>,
    next_run: Option<DateTime<Utc>>,
    last_error: Option<&str>,
    snapshot_count: i64,
) -> Result<(), DbError> {
    sqlx::query(
        r#"
        UPDATE snapshot_policies
        SET last_run = ?, next_run = ?, last_error = ?, snapshot_count = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(last_run)
    .bind(next_run)
    .bind(last_error)
    .bind(snapshot_count)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reschedule without firing (used when a policy is created or its schedule
/// edited).
pub async fn set_next_run(
    pool: &SqlitePool,
    id: Uuid,
    next_run: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    sqlx::query("UPDATE snapshot_policies SET next_run = ?, updated_at = ? WHERE id = ?")
        .bind(next_run)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM snapshot_policies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("snapshot policy".into()));
    }
    Ok(())
}
