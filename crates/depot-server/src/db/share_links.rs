//! Share link rows
//!
//! Counter increments are conditional single-statement UPDATEs so the
//! max_downloads / max_views caps hold under concurrent requests: the
//! statement only fires while the counter is below its cap, and a zero-row
//! result means the caller lost the race for the last slot.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::{ShareLink, TargetType};

#[derive(Debug, Clone)]
pub struct NewShareLink {
    pub token: String,
    pub owner_id: Uuid,
    pub target_path: String,
    pub target_type: TargetType,
    pub target_name: String,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: i64,
    pub max_views: i64,
    pub allow_download: bool,
    pub allow_preview: bool,
    pub allow_upload: bool,
    pub allow_listing: bool,
    pub show_owner: bool,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareLinkPatch {
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub max_downloads: Option<i64>,
    pub max_views: Option<i64>,
    pub allow_download: Option<bool>,
    pub allow_preview: Option<bool>,
    pub allow_upload: Option<bool>,
    pub allow_listing: Option<bool>,
    pub show_owner: Option<bool>,
    pub enabled: Option<bool>,
}

pub async fn create(pool: &SqlitePool, new: NewShareLink) -> Result<ShareLink, DbError> {
    let now = Utc::now();
    let link = ShareLink {
        id: Uuid::new_v4(),
        token: new.token,
        owner_id: new.owner_id,
        target_path: new.target_path,
        target_type: new.target_type,
        target_name: new.target_name,
        password_hash: new.password_hash,
        expires_at: new.expires_at,
        max_downloads: new.max_downloads,
        download_count: 0,
        max_views: new.max_views,
        view_count: 0,
        allow_download: new.allow_download,
        allow_preview: new.allow_preview,
        allow_upload: new.allow_upload,
        allow_listing: new.allow_listing,
        show_owner: new.show_owner,
        enabled: true,
        last_accessed: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO share_links (id, token, owner_id, target_path, target_type, target_name,
                                 password_hash, expires_at, max_downloads, download_count,
                                 max_views, view_count, allow_download, allow_preview,
                                 allow_upload, allow_listing, show_owner, enabled,
                                 last_accessed, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(link.id)
    .bind(&link.token)
    .bind(link.owner_id)
    .bind(&link.target_path)
    .bind(link.target_type)
    .bind(&link.target_name)
    .bind(&link.password_hash)
    .bind(link.expires_at)
    .bind(link.max_downloads)
    .bind(link.download_count)
    .bind(link.max_views)
    .bind(link.view_count)
    .bind(link.allow_download)
    .bind(link.allow_preview)
    .bind(link.allow_upload)
    .bind(link.allow_listing)
    .bind(link.show_owner)
    .bind(link.enabled)
    .bind(link.last_accessed)
    .bind(link.created_at)
    .bind(link.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "share link"))?;

    Ok(link)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<ShareLink, DbError> {
    sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("share link".into()))
}

pub async fn get_by_token(pool: &SqlitePool, token: &str) -> Result<ShareLink, DbError> {
    sqlx::query_as::<_, ShareLink>("SELECT * FROM share_links WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("share link".into()))
}

pub async fn list_for_owner(pool: &SqlitePool, owner_id: Uuid) -> Result<Vec<ShareLink>, DbError> {
    Ok(sqlx::query_as::<_, ShareLink>(
        "SELECT * FROM share_links WHERE owner_id = ? ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?)
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: ShareLinkPatch) -> Result<ShareLink, DbError> {
    let mut link = get(pool, id).await?;

    if let Some(expires_at) = patch.expires_at {
        link.expires_at = expires_at;
    }
    if let Some(v) = patch.max_downloads {
        link.max_downloads = v;
    }
    if let Some(v) = patch.max_views {
        link.max_views = v;
    }
    if let Some(v) = patch.allow_download {
        link.allow_download = v;
    }
    if let Some(v) = patch.allow_preview {
        link.allow_preview = v;
    }
    if let Some(v) = patch.allow_upload {
        link.allow_upload = v;
    }
    if let Some(v) = patch.allow_listing {
        link.allow_listing = v;
    }
    if let Some(v) = patch.show_owner {
        link.show_owner = v;
    }
    if let Some(v) = patch.enabled {
        link.enabled = v;
    }
    link.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE share_links
        SET expires_at = ?, max_downloads = ?, max_views = ?, allow_download = ?,
            allow_preview = ?, allow_upload = ?, allow_listing = ?, show_owner = ?,
            enabled = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(link.expires_at)
    .bind(link.max_downloads)
    .bind(link.max_views)
    .bind(link.allow_download)
    .bind(link.allow_preview)
    .bind(link.allow_upload)
    .bind(link.allow_listing)
    .bind(link.show_owner)
    .bind(link.enabled)
    .bind(link.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(link)
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM share_links WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("share link".into()));
    }
    Ok(())
}

/// Claim one download slot. Returns false when the cap is exhausted; callers
/// must claim before streaming a single byte.
pub async fn increment_download(pool: &SqlitePool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE share_links
        SET download_count = download_count + 1, last_accessed = ?
        WHERE id = ? AND (max_downloads = 0 OR download_count < max_downloads)
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Claim one view/preview slot.
pub async fn increment_view(pool: &SqlitePool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE share_links
        SET view_count = view_count + 1, last_accessed = ?
        WHERE id = ? AND (max_views = 0 OR view_count < max_views)
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn touch(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE share_links SET last_accessed = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sweep links past their deadline. Idempotent.
pub async fn clean_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM share_links WHERE expires_at IS NOT NULL AND expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
