//! Chunked-upload session rows
//!
//! The received-chunk set lives in the row as a JSON array. Receipt updates
//! run in an immediate transaction so two concurrent chunk receipts for the
//! same session serialise; progress readers always see a committed set.
//! State transitions use conditional UPDATEs: the loser of a finalize race
//! observes zero affected rows.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::DbError;
use crate::models::{UploadSession, UploadState};

#[derive(Debug, Clone)]
pub struct NewUploadSession {
    pub owner_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub destination_path: String,
    pub file_name: String,
    pub total_size: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
}

pub async fn create(pool: &SqlitePool, new: NewUploadSession) -> Result<UploadSession, DbError> {
    let now = Utc::now();
    let session = UploadSession {
        id: Uuid::new_v4(),
        owner_id: new.owner_id,
        zone_id: new.zone_id,
        destination_path: new.destination_path,
        file_name: new.file_name,
        total_size: new.total_size,
        chunk_size: new.chunk_size,
        total_chunks: new.total_chunks,
        received_chunks: Json(Vec::new()),
        state: UploadState::Active,
        created_at: now,
        last_activity: now,
    };

    sqlx::query(
        r#"
        INSERT INTO upload_sessions (id, owner_id, zone_id, destination_path, file_name,
                                     total_size, chunk_size, total_chunks, received_chunks,
                                     state, created_at, last_activity)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id)
    .bind(session.owner_id)
    .bind(session.zone_id)
    .bind(&session.destination_path)
    .bind(&session.file_name)
    .bind(session.total_size)
    .bind(session.chunk_size)
    .bind(session.total_chunks)
    .bind(&session.received_chunks)
    .bind(session.state)
    .bind(session.created_at)
    .bind(session.last_activity)
    .execute(pool)
    .await?;

    Ok(session)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<UploadSession, DbError> {
    sqlx::query_as::<_, UploadSession>("SELECT * FROM upload_sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("upload session".into()))
}

pub async fn list_active_for_owner(
    pool: &SqlitePool,
    owner_id: Uuid,
) -> Result<Vec<UploadSession>, DbError> {
    Ok(sqlx::query_as::<_, UploadSession>(
        "SELECT * FROM upload_sessions WHERE owner_id = ? AND state = 'active' ORDER BY created_at",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?)
}

/// Record a received chunk index: read-modify-write on the JSON set inside
/// a transaction. Re-receiving an index is a no-op on the set but still
/// refreshes last_activity.
pub async fn record_chunk(pool: &SqlitePool, id: Uuid, index: i64) -> Result<UploadSession, DbError> {
    let mut tx = pool.begin().await?;

    let mut session =
        sqlx::query_as::<_, UploadSession>("SELECT * FROM upload_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound("upload session".into()))?;

    if !session.received_chunks.0.contains(&index) {
        session.received_chunks.0.push(index);
        session.received_chunks.0.sort_unstable();
    }
    session.last_activity = Utc::now();

    sqlx::query("UPDATE upload_sessions SET received_chunks = ?, last_activity = ? WHERE id = ?")
        .bind(&session.received_chunks)
        .bind(session.last_activity)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(session)
}

/// Attempt the active -> finalizing transition. False means another caller
/// got there first (or the session is already terminal).
pub async fn try_begin_finalize(pool: &SqlitePool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE upload_sessions SET state = 'finalizing', last_activity = ? WHERE id = ? AND state = 'active'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_state(pool: &SqlitePool, id: Uuid, state: UploadState) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE upload_sessions SET state = ?, last_activity = ? WHERE id = ?")
        .bind(state)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("upload session".into()));
    }
    Ok(())
}

/// Sessions idle since before `cutoff`, any state. Completed/cancelled rows
/// are included so their metadata is eventually swept too.
pub async fn list_stale(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<UploadSession>, DbError> {
    Ok(sqlx::query_as::<_, UploadSession>(
        "SELECT * FROM upload_sessions WHERE last_activity <= ?",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?)
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM upload_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
