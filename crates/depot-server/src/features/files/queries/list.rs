//! Directory listing / stat query

use depot_common::DepotError;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::fsgate::FileEntry;
use crate::models::User;
use crate::state::AppState;

/// List the scope target when it is a directory, or stat it when it is a
/// file. An empty directory yields an empty vector, never null.
#[tracing::instrument(skip(state, user, scope), fields(path = %scope.rel))]
pub async fn handle(
    state: &AppState,
    user: &User,
    scope: &Scope,
) -> Result<Vec<FileEntry>, DepotError> {
    scope::authorize(state, user, scope, Action::List).await?;

    let meta = tokio::fs::metadata(&scope.abs).await?;
    if meta.is_dir() {
        state.fsgate.list(&scope.abs, &scope.rel).await
    } else {
        Ok(vec![state.fsgate.stat(&scope.abs, &scope.rel).await?])
    }
}

/// Stat exactly one entry.
pub async fn stat(
    state: &AppState,
    user: &User,
    scope: &Scope,
) -> Result<FileEntry, DepotError> {
    scope::authorize(state, user, scope, Action::Read).await?;
    state.fsgate.stat(&scope.abs, &scope.rel).await
}
