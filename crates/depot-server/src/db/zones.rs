//! Share zone rows

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{constraint_error, DbError};
use crate::models::{ShareZone, ZoneType};

#[derive(Debug, Clone)]
pub struct NewZone {
    pub name: String,
    pub pool_id: Uuid,
    pub path: String,
    pub zone_type: ZoneType,
    pub allowed_users: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub denied_users: Vec<String>,
    pub denied_groups: Vec<String>,
    pub read_only: bool,
    pub browsable: bool,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub allowed_users: Option<Vec<String>>,
    pub allowed_groups: Option<Vec<String>>,
    pub denied_users: Option<Vec<String>>,
    pub denied_groups: Option<Vec<String>>,
    pub auto_provision: Option<bool>,
    pub allow_network_shares: Option<bool>,
    pub allow_web_shares: Option<bool>,
    pub allow_guest_access: Option<bool>,
    pub smb_enabled: Option<bool>,
    pub nfs_enabled: Option<bool>,
    pub read_only: Option<bool>,
    pub browsable: Option<bool>,
    pub provision_template: Option<String>,
    pub max_quota_per_user: Option<i64>,
}

pub async fn create(pool: &SqlitePool, new: NewZone) -> Result<ShareZone, DbError> {
    let now = Utc::now();
    let zone = ShareZone {
        id: Uuid::new_v4(),
        name: new.name,
        pool_id: new.pool_id,
        path: new.path,
        zone_type: new.zone_type,
        allowed_users: Json(new.allowed_users),
        allowed_groups: Json(new.allowed_groups),
        denied_users: Json(new.denied_users),
        denied_groups: Json(new.denied_groups),
        auto_provision: false,
        allow_network_shares: false,
        allow_web_shares: true,
        allow_guest_access: false,
        smb_enabled: false,
        nfs_enabled: false,
        read_only: new.read_only,
        browsable: new.browsable,
        provision_template: String::new(),
        max_quota_per_user: 0,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO share_zones (id, name, pool_id, path, zone_type,
                                 allowed_users, allowed_groups, denied_users, denied_groups,
                                 auto_provision, allow_network_shares, allow_web_shares,
                                 allow_guest_access, smb_enabled, nfs_enabled,
                                 read_only, browsable, provision_template, max_quota_per_user,
                                 created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(zone.id)
    .bind(&zone.name)
    .bind(zone.pool_id)
    .bind(&zone.path)
    .bind(zone.zone_type)
    .bind(&zone.allowed_users)
    .bind(&zone.allowed_groups)
    .bind(&zone.denied_users)
    .bind(&zone.denied_groups)
    .bind(zone.auto_provision)
    .bind(zone.allow_network_shares)
    .bind(zone.allow_web_shares)
    .bind(zone.allow_guest_access)
    .bind(zone.smb_enabled)
    .bind(zone.nfs_enabled)
    .bind(zone.read_only)
    .bind(zone.browsable)
    .bind(&zone.provision_template)
    .bind(zone.max_quota_per_user)
    .bind(zone.created_at)
    .bind(zone.updated_at)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "share zone"))?;

    Ok(zone)
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<ShareZone, DbError> {
    sqlx::query_as::<_, ShareZone>("SELECT * FROM share_zones WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("share zone".into()))
}

pub async fn get_by_name(pool: &SqlitePool, name: &str) -> Result<ShareZone, DbError> {
    sqlx::query_as::<_, ShareZone>("SELECT * FROM share_zones WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound("share zone".into()))
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<ShareZone>, DbError> {
    Ok(
        sqlx::query_as::<_, ShareZone>("SELECT * FROM share_zones ORDER BY name")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn update(pool: &SqlitePool, id: Uuid, patch: ZonePatch) -> Result<ShareZone, DbError> {
    let mut zone = get(pool, id).await?;

    if let Some(name) = patch.name {
        zone.name = name;
    }
    if let Some(v) = patch.allowed_users {
        zone.allowed_users = Json(v);
    }
    if let Some(v) = patch.allowed_groups {
        zone.allowed_groups = Json(v);
    }
    if let Some(v) = patch.denied_users {
        zone.denied_users = Json(v);
    }
    if let Some(v) = patch.denied_groups {
        zone.denied_groups = Json(v);
    }
    if let Some(v) = patch.auto_provision {
        zone.auto_provision = v;
    }
    if let Some(v) = patch.allow_network_shares {
        zone.allow_network_shares = v;
    }
    if let Some(v) = patch.allow_web_shares {
        zone.allow_web_shares = v;
    }
    if let Some(v) = patch.allow_guest_access {
        zone.allow_guest_access = v;
    }
    if let Some(v) = patch.smb_enabled {
        zone.smb_enabled = v;
    }
    if let Some(v) = patch.nfs_enabled {
        zone.nfs_enabled = v;
    }
    if let Some(v) = patch.read_only {
        zone.read_only = v;
    }
    if let Some(v) = patch.browsable {
        zone.browsable = v;
    }
    if let Some(v) = patch.provision_template {
        zone.provision_template = v;
    }
    if let Some(v) = patch.max_quota_per_user {
        zone.max_quota_per_user = v;
    }
    zone.updated_at = Utc::now();

    sqlx::query(
        r#"
        UPDATE share_zones
        SET name = ?, allowed_users = ?, allowed_groups = ?, denied_users = ?, denied_groups = ?,
            auto_provision = ?, allow_network_shares = ?, allow_web_shares = ?,
            allow_guest_access = ?, smb_enabled = ?, nfs_enabled = ?,
            read_only = ?, browsable = ?, provision_template = ?, max_quota_per_user = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&zone.name)
    .bind(&zone.allowed_users)
    .bind(&zone.allowed_groups)
    .bind(&zone.denied_users)
    .bind(&zone.denied_groups)
    .bind(zone.auto_provision)
    .bind(zone.allow_network_shares)
    .bind(zone.allow_web_shares)
    .bind(zone.allow_guest_access)
    .bind(zone.smb_enabled)
    .bind(zone.nfs_enabled)
    .bind(zone.read_only)
    .bind(zone.browsable)
    .bind(&zone.provision_template)
    .bind(zone.max_quota_per_user)
    .bind(zone.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| constraint_error(e, "share zone"))?;

    Ok(zone)
}

pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM share_zones WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("share zone".into()));
    }
    Ok(())
}
