//! Delete one entry

use depot_common::DepotError;
use serde::Deserialize;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct DeleteParams {
    /// Directories require this to remove non-empty trees.
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
    params: DeleteParams,
) -> Result<(), DepotError> {
    if scope.abs == scope.root {
        return Err(DepotError::Invalid("cannot delete the root".into()));
    }

    scope::authorize(state, user, scope, Action::Delete).await?;
    state.fsgate.remove(&scope.abs, params.recursive).await?;

    tracing::info!("deleted");
    Ok(())
}
