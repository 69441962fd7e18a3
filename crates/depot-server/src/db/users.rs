//! User records

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::User;

/// Fields for a new user row. The hash is produced by the caller; this layer
/// never sees cleartext passwords.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub is_admin: bool,
    pub groups: Vec<String>,
    pub must_change_password: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    pub email: Option<String>,
    pub is_admin: Option<bool>,
    pub groups: Option<Vec<String>>,
    pub must_change_password: Option<bool>,
}

pub async fn create(pool: &SqlitePool, new: NewUser) -> Result<User, DbError> {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: new.username,
        password_hash: new.password_hash,
        email: new.email,
        is_admin: new.is_admin,
        groups: Json(new.groups),
        must_change_password: new.must_change_password,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, email, is_admin, groups,
                           must_change_password, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.email)
    .bind(user.is_admin)
    .bind(&user.groups)
    .bind(user.must_change_password)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "user"))?;

    Ok(user)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<User, DbError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("user".into()))
}

pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<User, DbError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("user".into()))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, DbError> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn count(pool: &SqlitePool) -> Result<i64, DbError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Apply a patch. Reads the current row and writes all mutable columns in
/// one UPDATE, so concurrent patches serialise on the row write.
pub async fn update(pool: &SqlitePool, id: Uuid, patch: UserPatch) -> Result<User, DbError> {
    let mut user = get(pool, id).await?;

    if let Some(email) = patch.email {
        user.email = email;
    }
    if let Some(is_admin) = patch.is_admin {
        user.is_admin = is_admin;
    }
    if let Some(groups) = patch.groups {
        user.groups = Json(groups);
    }
    if let Some(flag) = patch.must_change_password {
        user.must_change_password = flag;
    }
    user.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, is_admin = ?, groups = ?, must_change_password = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(user.is_admin)
    .bind(&user.groups)
    .bind(user.must_change_password)
    .bind(user.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(user)
}

pub async fn set_password_hash(
    pool: &SqlitePool,
    id: Uuid,
    password_hash: &str,
    must_change_password: bool,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = ?, must_change_password = ?, updated_at = ? WHERE id = ?",
    )
    .bind(password_hash)
    .bind(must_change_password)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}

/// Delete a user. Sessions cascade in the same statement via the FK.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("user".into()));
    }
    Ok(())
}
