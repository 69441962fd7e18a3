//! Share-link gating
//!
//! A link is live when it is enabled and not past its deadline. Password
//! protection is enforced per HTTP session via a short-lived unlock token
//! minted by `verify`; the unlock travels in the `X-Share-Auth` header or
//! the `share_auth` cookie.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use depot_common::paths;
use depot_common::DepotError;
use std::path::{Path, PathBuf};

use crate::db;
use crate::models::{ShareLink, TargetType};
use crate::state::AppState;

pub const UNLOCK_HEADER: &str = "x-share-auth";
pub const UNLOCK_COOKIE: &str = "share_auth";

/// Load a link by token and check liveness. Unknown tokens are NotFound;
/// disabled or expired links are Forbidden.
pub async fn load_live(state: &AppState, token: &str) -> Result<ShareLink, DepotError> {
    let link = db::share_links::get_by_token(&state.db, token).await?;

    if !link.enabled {
        return Err(DepotError::Forbidden("share link is disabled".into()));
    }
    if !link.is_live(Utc::now()) {
        return Err(DepotError::Forbidden("share link has expired".into()));
    }

    Ok(link)
}

fn unlock_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(UNLOCK_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }

    // fall back to the cookie set by verify
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == UNLOCK_COOKIE).then(|| value.to_string())
    })
}

/// Enforce the password gate for non-metadata actions.
pub fn require_unlocked(
    state: &AppState,
    link: &ShareLink,
    headers: &HeaderMap,
) -> Result<(), DepotError> {
    if !link.has_password() {
        return Ok(());
    }

    let unlocked = unlock_from_headers(headers)
        .map(|token| state.signer.verify_share_unlock(&token, link.id))
        .unwrap_or(false);

    if unlocked {
        Ok(())
    } else {
        Err(DepotError::Forbidden("share password required".into()))
    }
}

/// Resolve a request subpath inside the link's target. File targets accept
/// only the empty subpath; folder targets resolve below themselves.
pub fn resolve_subpath(link: &ShareLink, subpath: &str) -> Result<PathBuf, DepotError> {
    let root = Path::new(&link.target_path);

    match link.target_type {
        TargetType::File => {
            let cleaned = paths::clean_relative(subpath).ok_or(DepotError::Traversal)?;
            if !cleaned.is_empty() {
                return Err(DepotError::NotFound("share target is a single file".into()));
            }
            Ok(root.to_path_buf())
        },
        TargetType::Folder => paths::resolve(root, subpath).map_err(|e| match e {
            paths::PathError::Traversal => DepotError::Traversal,
            paths::PathError::Invalid(msg) => DepotError::Invalid(msg),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn link(target_type: TargetType) -> ShareLink {
        ShareLink {
            id: Uuid::new_v4(),
            token: "t".into(),
            owner_id: Uuid::new_v4(),
            target_path: "/tmp".into(),
            target_type,
            target_name: "tmp".into(),
            password_hash: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            max_downloads: 0,
            download_count: 0,
            max_views: 0,
            view_count: 0,
            allow_download: true,
            allow_preview: true,
            allow_upload: false,
            allow_listing: true,
            show_owner: false,
            enabled: true,
            last_accessed: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn file_target_rejects_subpaths() {
        let link = link(TargetType::File);
        assert!(resolve_subpath(&link, "").is_ok());
        assert!(resolve_subpath(&link, "/").is_ok());
        assert!(resolve_subpath(&link, "nested").is_err());
    }

    #[test]
    fn folder_target_stays_inside() {
        let link = link(TargetType::Folder);
        assert!(resolve_subpath(&link, "a/b").is_ok());
        assert!(matches!(
            resolve_subpath(&link, "../escape"),
            Err(DepotError::Traversal)
        ));
    }
}
