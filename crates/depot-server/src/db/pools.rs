//! Storage pool rows

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::StoragePool;

#[derive(Debug, Clone)]
pub struct NewPool {
    pub name: String,
    pub path: String,
    pub reserved_bytes: i64,
    pub max_file_size: i64,
    pub allowed_extensions: Vec<String>,
    pub denied_extensions: Vec<String>,
    pub default_user_quota: i64,
    pub default_group_quota: i64,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolPatch {
    pub name: Option<String>,
    pub reserved_bytes: Option<i64>,
    pub max_file_size: Option<i64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub denied_extensions: Option<Vec<String>>,
    pub default_user_quota: Option<i64>,
    pub default_group_quota: Option<i64>,
    pub enabled: Option<bool>,
}

pub async fn create(pool: &SqlitePool, new: NewPool) -> Result<StoragePool, DbError> {
    let now = Utc::now();
    let record = StoragePool {
        id: Uuid::new_v4(),
        name: new.name,
        path: new.path,
        reserved_bytes: new.reserved_bytes,
        max_file_size: new.max_file_size,
        allowed_extensions: Json(new.allowed_extensions),
        denied_extensions: Json(new.denied_extensions),
        default_user_quota: new.default_user_quota,
        default_group_quota: new.default_group_quota,
        enabled: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO storage_pools (id, name, path, reserved_bytes, max_file_size,
                                   allowed_extensions, denied_extensions,
                                   default_user_quota, default_group_quota, enabled,
                                   created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id)
    .bind(&record.name)
    .bind(&record.path)
    .bind(record.reserved_bytes)
    .bind(record.max_file_size)
    .bind(&record.allowed_extensions)
    .bind(&record.denied_extensions)
    .bind(record.default_user_quota)
    .bind(record.default_group_quota)
    .bind(record.enabled)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "storage pool"))?;

    Ok(record)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<StoragePool, DbError> {
    sqlx::query_as::<_, StoragePool>("SELECT * FROM storage_pools WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("storage pool".into()))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<StoragePool>, DbError> {
    Ok(
        sqlx::query_as::<_, StoragePool>("SELECT * FROM storage_pools ORDER BY name")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: PoolPatch) -> Result<StoragePool, DbError> {
    let mut record = get(pool, id).await?;

    if let Some(name) = patch.name {
        record.name = name;
    }
    if let Some(reserved) = patch.reserved_bytes {
        record.reserved_bytes = reserved;
    }
    if let Some(max_file_size) = patch.max_file_size {
        record.max_file_size = max_file_size;
    }
    if let Some(allowed) = patch.allowed_extensions {
        record.allowed_extensions = Json(allowed);
    }
    if let Some(denied) = patch.denied_extensions {
        record.denied_extensions = Json(denied);
    }
    if let Some(quota) = patch.default_user_quota {
        record.default_user_quota = quota;
    }
    if let Some(quota) = patch.default_group_quota {
        record.default_group_quota = quota;
    }
    if let Some(enabled) = patch.enabled {
        record.enabled = enabled;
    }
    record.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE storage_pools
        SET name = ?, reserved_bytes = ?, max_file_size = ?, allowed_extensions = ?,
            denied_extensions = ?, default_user_quota = ?, default_group_quota = ?,
            enabled = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.name)
    .bind(record.reserved_bytes)
    .bind(record.max_file_size)
    .bind(&record.allowed_extensions)
    .bind(&record.denied_extensions)
    .bind(record.default_user_quota)
    .bind(record.default_group_quota)
    .bind(record.enabled)
    .bind(record.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "storage pool"))?;

    Ok(record)
}

/// Fails with `InUse` while any zone still references the pool.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let zone_count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM share_zones WHERE pool_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
    if zone_count.0 > 0 {
        return Err(DbError::InUse("storage pool".into()));
    }

    let result = sqlx::query("DELETE FROM storage_pools WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| constraint_error(e, "storage pool"))?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("storage pool".into()));
    }
    Ok(())
}
