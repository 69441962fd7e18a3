//! Finalize an upload session
//!
//! Resolves the recorded destination, runs the same scope authorization as
//! every other write path (zone read-only pre-filter included), then hands
//! the atomic publish to the engine. Any failure here leaves the session
//! active so the client can fix the cause and retry.

use depot_common::DepotError;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::fsgate::FileEntry;
use crate::models::{UploadSession, User};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub entry: FileEntry,
}

/// Scope of the file being published (directory + file name).
async fn destination_scope(
    state: &AppState,
    user: &User,
    session: &UploadSession,
) -> Result<Scope, DepotError> {
    let target = if session.destination_path.is_empty() {
        session.file_name.clone()
    } else {
        format!("{}/{}", session.destination_path, session.file_name)
    };

    match session.zone_id {
        Some(zone_id) => scope::resolve_zone(state, user, &zone_id.to_string(), &target).await,
        None => scope::resolve_global(state, &target).await,
    }
}

#[tracing::instrument(skip(state, user), fields(session = %id))]
pub async fn handle(state: &AppState, user: &User, id: Uuid) -> Result<FinalizeResponse, DepotError> {
    let session = state.uploads.get(id).await?;
    super::create::ensure_owner(session.owner_id, user)?;

    let dest_scope = destination_scope(state, user, &session).await?;

    // The full write gate runs before the state transition, so a denial
    // (missing grant, read-only zone) leaves the session active.
    scope::authorize(state, user, &dest_scope, Action::Upload).await?;

    scope::check_upload_policy(
        dest_scope.pool.as_ref(),
        &session.file_name,
        session.total_size,
    )?;

    if tokio::fs::metadata(&dest_scope.abs).await.is_ok() {
        return Err(DepotError::AlreadyExists(session.file_name.clone()));
    }

    if let Some(parent) = dest_scope.abs.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    state.uploads.finalize(id, &dest_scope.abs).await?;

    let entry = state.fsgate.stat(&dest_scope.abs, &dest_scope.rel).await?;

    Ok(FinalizeResponse { entry })
}
