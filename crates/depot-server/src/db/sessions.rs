//! Bearer-session rows
//!
//! The row's existence is the second gate of token validation: deleting it
//! revokes the token immediately regardless of its signed expiry.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::DbError;
use crate::models::Session;

pub async fn insert(
    pool: &SqlitePool,
    token: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<Session, DbError> {
    let session = Session {
        token: token.to_string(),
        user_id,
        expires_at,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session.token)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await?;

    Ok(session)
}

pub async fn get(pool: &SqlitePool, token: &str) -> Result<Option<Session>, DbError> {
    Ok(
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?,
    )
}

/// Idempotent: removing an absent session is not an error.
pub async fn delete(pool: &SqlitePool, token: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Sweep sessions past their expiry. Idempotent.
pub async fn clean_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
