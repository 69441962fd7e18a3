//! Create a directory

use depot_common::DepotError;
use serde::Deserialize;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::fsgate::FileEntry;
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct MkdirParams {
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

#[tracing::instrument(skip(state, user, scope), fields(path = %scope.rel))]
pub async fn handle(
    state: &AppState,
    user: &User,
    scope: &Scope,
    params: MkdirParams,
) -> Result<FileEntry, DepotError> {
    if scope.abs == scope.root {
        return Err(DepotError::AlreadyExists("directory".into()));
    }

    scope::authorize(state, user, scope, Action::Mkdir).await?;
    state.fsgate.mkdir(&scope.abs, params.recursive).await?;

    tracing::info!("directory created");
    state.fsgate.stat(&scope.abs, &scope.rel).await
}
