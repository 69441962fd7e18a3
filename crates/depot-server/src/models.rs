//! Domain entities persisted by the metadata store.
//!
//! Rows are mapped straight from SQLite with `sqlx::FromRow`; list-valued
//! columns are JSON text behind `sqlx::types::Json`. API responses serialize
//! these structs directly, with secrets skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Permission grant type. One value per row; types are independent of each
/// other (write does not imply read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PermType {
    Read,
    Write,
    Delete,
}

impl std::fmt::Display for PermType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermType::Read => write!(f, "read"),
            PermType::Write => write!(f, "write"),
            PermType::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ZoneType {
    Personal,
    Group,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TargetType {
    File,
    Folder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UploadState {
    Active,
    Finalizing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub is_admin: bool,
    pub groups: Json<Vec<String>>,
    pub must_change_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.0.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub path: String,
    #[serde(rename = "type")]
    pub perm_type: PermType,
    pub username: String,
    #[serde(rename = "group")]
    pub group_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// True when this row applies to the given user, by name or by one of
    /// their groups.
    pub fn matches_subject(&self, username: &str, groups: &[String]) -> bool {
        if !self.username.is_empty() {
            self.username == username
        } else {
            groups.iter().any(|g| *g == self.group_name)
        }
    }

    pub fn is_user_scoped(&self) -> bool {
        !self.username.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoragePool {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub reserved_bytes: i64,
    pub max_file_size: i64,
    pub allowed_extensions: Json<Vec<String>>,
    pub denied_extensions: Json<Vec<String>>,
    pub default_user_quota: i64,
    pub default_group_quota: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoragePool {
    /// File-name policy check: the denied set wins, then a non-empty allowed
    /// set becomes a whitelist.
    pub fn extension_allowed(&self, file_name: &str) -> bool {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        if self.denied_extensions.0.iter().any(|d| d.eq_ignore_ascii_case(&ext)) {
            return false;
        }
        if self.allowed_extensions.0.is_empty() {
            return true;
        }
        self.allowed_extensions.0.iter().any(|a| a.eq_ignore_ascii_case(&ext))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareZone {
    pub id: Uuid,
    pub name: String,
    pub pool_id: Uuid,
    pub path: String,
    pub zone_type: ZoneType,
    pub allowed_users: Json<Vec<String>>,
    pub allowed_groups: Json<Vec<String>>,
    pub denied_users: Json<Vec<String>>,
    pub denied_groups: Json<Vec<String>>,
    pub auto_provision: bool,
    pub allow_network_shares: bool,
    pub allow_web_shares: bool,
    pub allow_guest_access: bool,
    pub smb_enabled: bool,
    pub nfs_enabled: bool,
    pub read_only: bool,
    pub browsable: bool,
    pub provision_template: String,
    pub max_quota_per_user: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShareZone {
    /// Zone-level access pre-filter, applied before the permission engine.
    /// Deny lists win; empty allow lists admit everyone for public zones and
    /// nobody extra for the others.
    pub fn admits(&self, user: &User) -> bool {
        if self.denied_users.0.iter().any(|u| *u == user.username) {
            return false;
        }
        if user.groups.0.iter().any(|g| self.denied_groups.0.contains(g)) {
            return false;
        }
        if self.allowed_users.0.iter().any(|u| *u == user.username) {
            return true;
        }
        if user.groups.0.iter().any(|g| self.allowed_groups.0.contains(g)) {
            return true;
        }
        match self.zone_type {
            ZoneType::Public => true,
            _ => self.allowed_users.0.is_empty() && self.allowed_groups.0.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShareLink {
    pub id: Uuid,
    pub token: String,
    pub owner_id: Uuid,
    pub target_path: String,
    pub target_type: TargetType,
    pub target_name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: i64,
    pub download_count: i64,
    pub max_views: i64,
    pub view_count: i64,
    pub allow_download: bool,
    pub allow_preview: bool,
    pub allow_upload: bool,
    pub allow_listing: bool,
    pub show_owner: bool,
    pub enabled: bool,
    pub last_accessed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Liveness: enabled and not past its deadline. Counter caps are
    /// enforced separately, per action.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_at.map_or(true, |exp| now < exp)
    }

    pub fn downloads_remaining(&self) -> bool {
        self.max_downloads == 0 || self.download_count < self.max_downloads
    }

    pub fn views_remaining(&self) -> bool {
        self.max_views == 0 || self.view_count < self.max_views
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UploadSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub zone_id: Option<Uuid>,
    pub destination_path: String,
    pub file_name: String,
    pub total_size: i64,
    pub chunk_size: i64,
    pub total_chunks: i64,
    pub received_chunks: Json<Vec<i64>>,
    pub state: UploadState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UploadSession {
    pub fn received_count(&self) -> i64 {
        self.received_chunks.0.len() as i64
    }

    pub fn is_complete(&self) -> bool {
        self.received_count() == self.total_chunks
    }

    /// Bytes received so far; the last chunk may be short.
    pub fn bytes_received(&self) -> i64 {
        let last_index = self.total_chunks - 1;
        self.received_chunks
            .0
            .iter()
            .map(|&i| {
                if i == last_index {
                    self.total_size - self.chunk_size * last_index
                } else {
                    self.chunk_size
                }
            })
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnapshotPolicy {
    pub id: Uuid,
    pub name: String,
    pub dataset: String,
    pub schedule: String,
    pub retention: i64,
    pub prefix: String,
    pub recursive: bool,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub snapshot_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub category: String,
    pub updated_at: DateTime<Utc>,
}
