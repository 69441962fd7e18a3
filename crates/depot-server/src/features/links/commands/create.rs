//! Create a share link
//!
//! The owner must be able to read the target themselves; the minted token
//! then becomes the anonymous grant. Tokens carry 24 bytes of entropy,
//! URL-safe encoded.

use base64::Engine;
use chrono::{DateTime, Utc};
use depot_common::DepotError;
use rand::RngCore;
use serde::Deserialize;

use crate::authz::Action;
use crate::db::{self, share_links::NewShareLink};
use crate::features::shared::scope;
use crate::auth::identity;
use crate::models::{ShareLink, TargetType, User};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLinkCommand {
    /// Zone id or name; absent means the legacy global tree.
    #[serde(default)]
    pub zone: Option<String>,
    pub target_path: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_downloads: i64,
    #[serde(default)]
    pub max_views: i64,
    #[serde(default = "default_true")]
    pub allow_download: bool,
    #[serde(default = "default_true")]
    pub allow_preview: bool,
    #[serde(default)]
    pub allow_upload: bool,
    #[serde(default)]
    pub allow_listing: bool,
    #[serde(default)]
    pub show_owner: bool,
}

fn default_true() -> bool {
    true
}

impl CreateLinkCommand {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DepotError> {
        if self.max_downloads < 0 || self.max_views < 0 {
            return Err(DepotError::Invalid("counters must be non-negative".into()));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return Err(DepotError::Invalid("expires_at must be in the future".into()));
            }
        }
        if let Some(password) = &self.password {
            if password.len() < 4 {
                return Err(DepotError::Invalid("share password is too short".into()));
            }
        }
        Ok(())
    }
}

/// 24 random bytes, URL-safe: comfortably past the 16-byte entropy floor.
pub fn mint_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[tracing::instrument(skip(state, user, command), fields(target = %command.target_path))]
pub async fn handle(
    state: &AppState,
    user: &User,
    command: CreateLinkCommand,
) -> Result<ShareLink, DepotError> {
    command.validate(Utc::now())?;

    let resolved = match &command.zone {
        Some(zone_ref) => scope::resolve_zone(state, user, zone_ref, &command.target_path).await?,
        None => scope::resolve_global(state, &command.target_path).await?,
    };

    scope::authorize(state, user, &resolved, Action::Read).await?;

    let meta = tokio::fs::metadata(&resolved.abs).await?;
    let target_type = if meta.is_dir() {
        TargetType::Folder
    } else {
        TargetType::File
    };

    if command.allow_upload && target_type != TargetType::Folder {
        return Err(DepotError::Invalid(
            "uploads require a folder target".into(),
        ));
    }

    let password_hash = match &command.password {
        Some(password) => Some(identity::hash_password(password).await?),
        None => None,
    };

    let target_name = resolved
        .abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "/".to_string());

    let link = db::share_links::create(
        &state.db,
        NewShareLink {
            token: mint_token(),
            owner_id: user.id,
            target_path: resolved.abs.to_string_lossy().into_owned(),
            target_type,
            target_name,
            password_hash,
            expires_at: command.expires_at,
            max_downloads: command.max_downloads,
            max_views: command.max_views,
            allow_download: command.allow_download,
            allow_preview: command.allow_preview,
            allow_upload: command.allow_upload,
            allow_listing: command.allow_listing,
            show_owner: command.show_owner,
        },
    )
    .await?;

    tracing::info!(link = %link.id, "share link created");
    Ok(link)
}
