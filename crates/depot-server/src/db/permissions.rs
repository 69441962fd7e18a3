//! Permission grant rows

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::{PermType, Permission};

#[derive(Debug, Clone)]
pub struct NewPermission {
    /// Already normalised by the caller (no trailing slash except root).
    pub path: String,
    pub perm_type: PermType,
    pub username: String,
    pub group_name: String,
}

pub async fn grant(pool: &SqlitePool, new: NewPermission) -> Result<Permission, DbError> {
    let now = Utc::now();
    let permission = Permission {
        id: Uuid::new_v4(),
        path: new.path,
        perm_type: new.perm_type,
        username: new.username,
        group_name: new.group_name,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO permissions (id, path, perm_type, username, group_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(permission.id)
    .bind(&permission.path)
    .bind(permission.perm_type)
    .bind(&permission.username)
    .bind(&permission.group_name)
    .bind(permission.created_at)
    .bind(permission.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "permission"))?;

    Ok(permission)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Permission, DbError> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("permission".into()))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Permission>, DbError> {
    Ok(
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY path, username, group_name")
            .fetch_all(pool)
            .await?,
    )
}

/// Rows that could apply to this subject: user-scoped rows for the username
/// plus group-scoped rows for any of the groups. Path filtering happens in
/// the engine.
pub async fn list_for_subject(
    pool: &SqlitePool,
    username: &str,
    groups: &[String],
) -> Result<Vec<Permission>, DbError> {
    let mut rows = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE username = ?")
        .bind(username)
        .fetch_all(pool)
        .await?;

    // Group list is small (host group membership); one query per group keeps
    // the SQL static.
    for group in groups {
        let group_rows =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE group_name = ?")
                .bind(group)
                .fetch_all(pool)
                .await?;
        rows.extend(group_rows);
    }

    Ok(rows)
}

pub async fn revoke(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("permission".into()));
    }
    Ok(())
}
