//! Rename / move within one scope
//!
//! The source needs `delete`, the destination `write`; both sides stay
//! inside the scope's envelope. A cross-filesystem rename degrades to
//! copy+delete and the response says so.

use depot_common::DepotError;
use serde::{Deserialize, Serialize};

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameCommand {
    pub new_path: String,
}

#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub path: String,
    pub atomic: bool,
}

#[tracing::instrument(skip(state, user, scope, command), fields(from = %scope.rel))]
pub async fn handle(
    state: &AppState,
    user: &User,
    scope: &Scope,
    command: RenameCommand,
) -> Result<RenameResponse, DepotError> {
    if command.new_path.trim().is_empty() {
        return Err(DepotError::Invalid("new_path is required".into()));
    }

    let dst = scope.sibling(&command.new_path)?;

    scope::authorize(state, user, scope, Action::RenameSource).await?;

    let dst_str = dst.to_str().ok_or(DepotError::Traversal)?;
    crate::authz::authorize(&state.db, user, dst_str, Action::RenameDestination).await?;

    if tokio::fs::metadata(&dst).await.is_ok() {
        return Err(DepotError::AlreadyExists("destination".into()));
    }

    let atomic = state.fsgate.rename(&scope.abs, &dst).await?;

    tracing::info!(to = %command.new_path, atomic, "renamed");
    Ok(RenameResponse {
        path: command.new_path,
        atomic,
    })
}
