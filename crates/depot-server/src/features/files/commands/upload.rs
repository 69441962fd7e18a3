//! Direct (single-request) file upload
//!
//! The multipart body has already been drained by the route; this command
//! validates, applies the pool policy, permission-checks the destination
//! and writes the bytes.

use depot_common::DepotError;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::fsgate::{FileEntry, WriteMode};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug)]
pub struct UploadFileCommand {
    pub content: Vec<u8>,
    /// Allow clobbering an existing file.
    pub overwrite: bool,
}

#[tracing::instrument(skip(state, user, scope, command), fields(path = %scope.rel, size = command.content.len()))]
pub async fn handle(
    state: &AppState,
    user: &User,
    scope: &Scope,
    command: UploadFileCommand,
) -> Result<FileEntry, DepotError> {
    let file_name = scope
        .abs
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DepotError::Invalid("upload target must name a file".into()))?
        .to_string();

    scope::check_upload_policy(scope.pool.as_ref(), &file_name, command.content.len() as i64)?;
    scope::authorize(state, user, scope, Action::Upload).await?;

    let mode = if command.overwrite {
        WriteMode::Truncate
    } else {
        WriteMode::CreateNew
    };
    state.fsgate.write_all(&scope.abs, mode, &command.content).await?;

    tracing::info!(file = %file_name, "file uploaded");
    state.fsgate.stat(&scope.abs, &scope.rel).await
}
