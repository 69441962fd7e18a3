//! Declare a storage pool
//!
//! The pool path must already exist as an absolute directory; depot never
//! formats or mounts anything itself (that belongs to the host tooling).

use depot_common::DepotError;
use serde::Deserialize;
use std::path::Path;

use crate::db::{self, pools::NewPool};
use crate::features::shared::validation::validate_name;
use crate::models::StoragePool;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePoolCommand {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub reserved_bytes: i64,
    #[serde(default)]
    pub max_file_size: i64,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub denied_extensions: Vec<String>,
    #[serde(default)]
    pub default_user_quota: i64,
    #[serde(default)]
    pub default_group_quota: i64,
}

impl CreatePoolCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        validate_name(&self.name, 255).map_err(|e| DepotError::Invalid(e.to_string()))?;
        if !self.path.starts_with('/') {
            return Err(DepotError::Invalid("pool path must be absolute".into()));
        }
        if self.reserved_bytes < 0 || self.max_file_size < 0 {
            return Err(DepotError::Invalid("sizes must be non-negative".into()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(name = %command.name, path = %command.path))]
pub async fn handle(state: &AppState, command: CreatePoolCommand) -> Result<StoragePool, DepotError> {
    command.validate()?;

    let meta = tokio::fs::metadata(Path::new(&command.path))
        .await
        .map_err(|_| DepotError::Invalid(format!("pool path {} does not exist", command.path)))?;
    if !meta.is_dir() {
        return Err(DepotError::Invalid(format!(
            "pool path {} is not a directory",
            command.path
        )));
    }

    let pool = db::pools::create(
        &state.db,
        NewPool {
            name: command.name,
            path: command.path,
            reserved_bytes: command.reserved_bytes,
            max_file_size: command.max_file_size,
            allowed_extensions: command.allowed_extensions,
            denied_extensions: command.denied_extensions,
            default_user_quota: command.default_user_quota,
            default_group_quota: command.default_group_quota,
        },
    )
    .await?;

    tracing::info!(pool = %pool.id, "storage pool created");
    Ok(pool)
}
