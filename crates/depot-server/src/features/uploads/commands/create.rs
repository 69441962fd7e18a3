//! Create an upload session
//!
//! The destination is recorded but only resolved and permission-checked at
//! finalize, so a grant that arrives mid-upload still lets the client
//! publish. Pool file policy (extensions, size cap) is checked up front to
//! fail fast before gigabytes move.

use depot_common::DepotError;
use serde::Deserialize;
use uuid::Uuid;

use crate::features::shared::scope;
use crate::features::shared::validation::validate_name;
use crate::models::{UploadSession, User};
use crate::state::AppState;

/// 512 KiB floor keeps session chunk counts sane; 128 MiB ceiling bounds
/// per-request memory.
const MIN_CHUNK_SIZE: i64 = 512 * 1024;
pub const MAX_CHUNK_SIZE: i64 = 128 * 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUploadCommand {
    /// Zone id or name; absent means the legacy global tree.
    #[serde(default)]
    pub zone: Option<String>,
    /// Directory (scope-relative) the file will land in.
    #[serde(default)]
    pub destination_path: String,
    pub file_name: String,
    pub total_size: i64,
    pub chunk_size: i64,
}

impl CreateUploadCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        validate_name(&self.file_name, 255)
            .map_err(|e| DepotError::Invalid(e.to_string()))?;
        if self.total_size < 0 {
            return Err(DepotError::Invalid("total_size must be non-negative".into()));
        }
        if self.chunk_size < MIN_CHUNK_SIZE || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(DepotError::Invalid(format!(
                "chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}"
            )));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, user, command), fields(file = %command.file_name, size = command.total_size))]
pub async fn handle(
    state: &AppState,
    user: &User,
    command: CreateUploadCommand,
) -> Result<UploadSession, DepotError> {
    command.validate()?;

    // Resolve now to validate the destination string and grab the pool
    // policy; the write permission itself is a finalize-time concern.
    let (zone_id, resolved) = match &command.zone {
        Some(zone_ref) => {
            let resolved = scope::resolve_zone(state, user, zone_ref, &command.destination_path).await?;
            let zone_id = resolved.zone.as_ref().map(|z| z.id);
            (zone_id, resolved)
        },
        None => (
            None,
            scope::resolve_global(state, &command.destination_path).await?,
        ),
    };

    scope::check_upload_policy(resolved.pool.as_ref(), &command.file_name, command.total_size)?;

    state
        .uploads
        .create_session(
            user.id,
            zone_id,
            resolved.rel,
            command.file_name,
            command.total_size,
            command.chunk_size,
        )
        .await
}

/// Owner gate shared by the session-scoped routes.
pub fn ensure_owner(session_owner: Uuid, user: &User) -> Result<(), DepotError> {
    if user.is_admin || session_owner == user.id {
        Ok(())
    } else {
        Err(DepotError::Forbidden("not your upload session".into()))
    }
}
