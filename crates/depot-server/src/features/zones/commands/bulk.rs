//! Bulk delete / move within a zone
//!
//! Per-path semantics throughout: a path that fails resolution or the
//! permission check is reported in its slot and the rest of the batch
//! proceeds.

use depot_common::DepotError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::authz::{self, Action};
use crate::features::shared::scope::Scope;
use crate::fsgate::BulkResult;
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkDeleteCommand {
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkMoveCommand {
    pub paths: Vec<String>,
    pub destination: String,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub results: Vec<BulkResult>,
}

const MAX_BULK_PATHS: usize = 1000;

fn check_batch(paths: &[String]) -> Result<(), DepotError> {
    if paths.is_empty() {
        return Err(DepotError::Invalid("paths must not be empty".into()));
    }
    if paths.len() > MAX_BULK_PATHS {
        return Err(DepotError::Invalid(format!(
            "at most {MAX_BULK_PATHS} paths per request"
        )));
    }
    Ok(())
}

/// Resolve and permission-check each entry; failures become per-path
/// results instead of errors.
async fn partition_targets(
    state: &AppState,
    user: &User,
    zone_scope: &Scope,
    paths: Vec<String>,
    action: Action,
) -> (Vec<(String, PathBuf)>, Vec<BulkResult>) {
    let mut targets = Vec::new();
    let mut rejected = Vec::new();

    for client_path in paths {
        let abs = match zone_scope.sibling(&client_path) {
            Ok(abs) => abs,
            Err(e) => {
                rejected.push(BulkResult {
                    path: client_path,
                    ok: false,
                    error: Some(e.to_string()),
                    atomic: true,
                });
                continue;
            },
        };

        let abs_str = abs.to_string_lossy().into_owned();
        if let Err(e) = authz::authorize(&state.db, user, &abs_str, action).await {
            rejected.push(BulkResult {
                path: client_path,
                ok: false,
                error: Some(e.to_string()),
                atomic: true,
            });
            continue;
        }

        targets.push((client_path, abs));
    }

    (targets, rejected)
}

#[tracing::instrument(skip(state, user, zone_scope, command), fields(count = command.paths.len()))]
pub async fn delete(
    state: &AppState,
    user: &User,
    zone_scope: &Scope,
    command: BulkDeleteCommand,
) -> Result<BulkResponse, DepotError> {
    check_batch(&command.paths)?;

    if let Some(zone) = &zone_scope.zone {
        if zone.read_only {
            return Err(DepotError::Forbidden(format!("zone {} is read-only", zone.name)));
        }
    }

    let (targets, mut results) =
        partition_targets(state, user, zone_scope, command.paths, Action::Delete).await;
    results.extend(state.fsgate.bulk_delete(targets).await);

    Ok(BulkResponse { results })
}

#[tracing::instrument(skip(state, user, zone_scope, command), fields(count = command.paths.len()))]
pub async fn move_entries(
    state: &AppState,
    user: &User,
    zone_scope: &Scope,
    command: BulkMoveCommand,
) -> Result<BulkResponse, DepotError> {
    check_batch(&command.paths)?;

    if let Some(zone) = &zone_scope.zone {
        if zone.read_only {
            return Err(DepotError::Forbidden(format!("zone {} is read-only", zone.name)));
        }
    }

    let dst_dir = zone_scope.sibling(&command.destination)?;
    let dst_str = dst_dir.to_string_lossy().into_owned();
    authz::authorize(&state.db, user, &dst_str, Action::RenameDestination).await?;

    if !tokio::fs::metadata(&dst_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(DepotError::Invalid("destination must be an existing directory".into()));
    }

    let (targets, mut results) =
        partition_targets(state, user, zone_scope, command.paths, Action::RenameSource).await;
    results.extend(state.fsgate.bulk_move(targets, &dst_dir).await);

    Ok(BulkResponse { results })
}
