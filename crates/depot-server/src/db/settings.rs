//! Settings table

use chrono::Utc;
use sqlx::SqlitePool;

use super::DbError;
use crate::models::Setting;

/// Key of the first-run gate.
pub const SETUP_COMPLETE: &str = "setup_complete";

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<Setting>, DbError> {
    Ok(
        sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Setting>, DbError> {
    Ok(
        sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY category, key")
            .fetch_all(pool)
            .await?,
    )
}

/// Upsert a setting.
pub async fn set(
    pool: &SqlitePool,
    key: &str,
    value: &str,
    value_type: &str,
    category: &str,
) -> Result<Setting, DbError> {
    let setting = Setting {
        key: key.to_string(),
        value: value.to_string(),
        value_type: value_type.to_string(),
        category: category.to_string(),
        updated_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO settings (key, value, value_type, category, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE
        SET value = excluded.value, value_type = excluded.value_type,
            category = excluded.category, updated_at = excluded.updated_at
        "#,
    )
    .bind(&setting.key)
    .bind(&setting.value)
    .bind(&setting.value_type)
    .bind(&setting.category)
    .bind(setting.updated_at)
    .execute(pool)
    .await?;

    Ok(setting)
}

pub async fn setup_complete(pool: &SqlitePool) -> Result<bool, DbError> {
    Ok(get(pool, SETUP_COMPLETE)
        .await?
        .map(|s| s.value == "true")
        .unwrap_or(false))
}

pub async fn mark_setup_complete(pool: &SqlitePool) -> Result<(), DbError> {
    set(pool, SETUP_COMPLETE, "true", "bool", "system").await?;
    Ok(())
}
