//! Request-path scoping
//!
//! Every file-touching route goes through here: the client's path string is
//! resolved against the scope's root (the data directory for legacy global
//! routes, the zone root for zone routes), and the caller's permissions are
//! checked against the resolved absolute path. Nothing downstream sees an
//! unresolved path.

use depot_common::paths::{self, PathError};
use depot_common::DepotError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::authz::{self, Action};
use crate::db;
use crate::models::{ShareZone, StoragePool, User};
use crate::state::AppState;

/// A resolved filesystem scope for one request.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Envelope root every path in this scope resolves against.
    pub root: PathBuf,
    /// The resolved absolute target.
    pub abs: PathBuf,
    /// Client-visible relative path (cleaned).
    pub rel: String,
    pub zone: Option<ShareZone>,
    pub pool: Option<StoragePool>,
}

impl Scope {
    /// The absolute path as a string, for permission rows.
    pub fn abs_str(&self) -> &str {
        self.abs.to_str().unwrap_or("")
    }

    /// Resolve a second path in the same envelope (rename destinations,
    /// bulk entries).
    pub fn sibling(&self, user_path: &str) -> Result<PathBuf, DepotError> {
        paths::resolve(&self.root, user_path).map_err(map_path_error)
    }
}

pub fn map_path_error(err: PathError) -> DepotError {
    match err {
        PathError::Traversal => DepotError::Traversal,
        PathError::Invalid(msg) => DepotError::Invalid(msg),
    }
}

fn clean_rel(user_path: &str) -> Result<String, DepotError> {
    paths::clean_relative(user_path)
        .map(|segments| segments.join("/"))
        .ok_or(DepotError::Traversal)
}

/// Legacy global scope, rooted at the data directory.
pub async fn resolve_global(state: &AppState, user_path: &str) -> Result<Scope, DepotError> {
    let root = state.config.storage.data_dir.clone();
    let root = root
        .canonicalize()
        .map_err(|e| DepotError::Storage(format!("data dir unavailable: {e}")))?;
    let abs = paths::resolve(&root, user_path).map_err(map_path_error)?;

    Ok(Scope {
        rel: clean_rel(user_path)?,
        root,
        abs,
        zone: None,
        pool: None,
    })
}

/// Zone scope: `zone_ref` is a zone id or name; `user_path` is relative to
/// the zone root. Applies the zone's allow/deny pre-filter for the caller.
pub async fn resolve_zone(
    state: &AppState,
    user: &User,
    zone_ref: &str,
    user_path: &str,
) -> Result<Scope, DepotError> {
    let zone = match Uuid::parse_str(zone_ref) {
        Ok(id) => db::zones::get(&state.db, id).await?,
        Err(_) => db::zones::get_by_name(&state.db, zone_ref).await?,
    };

    let pool = db::pools::get(&state.db, zone.pool_id).await?;
    if !pool.enabled {
        return Err(DepotError::Forbidden(format!(
            "storage pool {} is disabled",
            pool.name
        )));
    }

    if !user.is_admin && !zone.admits(user) {
        return Err(DepotError::Forbidden(format!(
            "zone {} does not admit {}",
            zone.name, user.username
        )));
    }

    // The zone root itself must resolve inside its pool.
    let pool_root = Path::new(&pool.path);
    let zone_root = paths::resolve(pool_root, &zone.path).map_err(map_path_error)?;
    let abs = paths::resolve(&zone_root, user_path).map_err(map_path_error)?;

    Ok(Scope {
        rel: clean_rel(user_path)?,
        root: zone_root,
        abs,
        zone: Some(zone),
        pool: Some(pool),
    })
}

/// Permission + zone-flag check for an already-resolved scope.
pub async fn authorize(
    state: &AppState,
    user: &User,
    scope: &Scope,
    action: Action,
) -> Result<(), DepotError> {
    if let Some(zone) = &scope.zone {
        if zone.read_only && action.required_type() != crate::models::PermType::Read {
            return Err(DepotError::Forbidden(format!(
                "zone {} is read-only",
                zone.name
            )));
        }
    }

    authz::authorize(&state.db, user, scope.abs_str(), action).await
}

/// Pool upload policy: extension filter and size cap.
pub fn check_upload_policy(
    pool: Option<&StoragePool>,
    file_name: &str,
    size: i64,
) -> Result<(), DepotError> {
    let Some(pool) = pool else { return Ok(()) };

    if !pool.extension_allowed(file_name) {
        return Err(DepotError::Invalid(format!(
            "file type not permitted in pool {}",
            pool.name
        )));
    }
    if pool.max_file_size > 0 && size > pool.max_file_size {
        return Err(DepotError::QuotaExceeded(format!(
            "file exceeds pool limit of {} bytes",
            pool.max_file_size
        )));
    }
    Ok(())
}
