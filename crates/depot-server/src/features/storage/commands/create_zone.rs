//! Carve a zone out of a pool
//!
//! The zone's host directory is `join(pool.path, zone.path)` and must
//! resolve inside the pool; it is created on the spot so the zone is
//! immediately usable.

use depot_common::paths;
use depot_common::DepotError;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use crate::db::{self, zones::NewZone};
use crate::features::shared::scope::map_path_error;
use crate::features::shared::validation::validate_name;
use crate::models::{ShareZone, ZoneType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateZoneCommand {
    pub name: String,
    pub pool_id: Uuid,
    pub path: String,
    pub zone_type: ZoneType,
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default)]
    pub allowed_groups: Vec<String>,
    #[serde(default)]
    pub denied_users: Vec<String>,
    #[serde(default)]
    pub denied_groups: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub browsable: bool,
}

fn default_true() -> bool {
    true
}

impl CreateZoneCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        validate_name(&self.name, 255).map_err(|e| DepotError::Invalid(e.to_string()))?;
        if self.path.trim().is_empty() {
            return Err(DepotError::Invalid("zone path is required".into()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(name = %command.name))]
pub async fn handle(state: &AppState, command: CreateZoneCommand) -> Result<ShareZone, DepotError> {
    command.validate()?;

    let pool = db::pools::get(&state.db, command.pool_id).await?;

    // Envelope check against the pool root; rejects "../" zone paths.
    let zone_root =
        paths::resolve(Path::new(&pool.path), &command.path).map_err(map_path_error)?;
    tokio::fs::create_dir_all(&zone_root).await?;

    let zone = db::zones::create(
        &state.db,
        NewZone {
            name: command.name,
            pool_id: command.pool_id,
            path: command.path,
            zone_type: command.zone_type,
            allowed_users: command.allowed_users,
            allowed_groups: command.allowed_groups,
            denied_users: command.denied_users,
            denied_groups: command.denied_groups,
            read_only: command.read_only,
            browsable: command.browsable,
        },
    )
    .await?;

    tracing::info!(zone = %zone.id, root = %zone_root.display(), "share zone created");
    Ok(zone)
}
