//! Create a snapshot policy

use chrono::Utc;
use depot_common::DepotError;
use serde::Deserialize;

use crate::db::{self, snapshot_policies::NewSnapshotPolicy};
use crate::features::shared::validation::validate_name;
use crate::models::SnapshotPolicy;
use crate::snapshots::SnapshotRunner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePolicyCommand {
    pub name: String,
    pub dataset: String,
    /// Six-field cron expression (seconds first), e.g. `0 */5 * * * *`.
    pub schedule: String,
    #[serde(default = "default_retention")]
    pub retention: i64,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub recursive: bool,
}

fn default_retention() -> i64 {
    7
}

fn default_prefix() -> String {
    "auto".to_string()
}

impl CreatePolicyCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        validate_name(&self.name, 255).map_err(|e| DepotError::Invalid(e.to_string()))?;
        if self.dataset.trim().is_empty() {
            return Err(DepotError::Invalid("dataset is required".into()));
        }
        if self.retention < 1 {
            return Err(DepotError::Invalid("retention must be at least 1".into()));
        }
        if self.prefix.trim().is_empty() || self.prefix.contains('@') {
            return Err(DepotError::Invalid("prefix must be a plain name".into()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(name = %command.name))]
pub async fn handle(state: &AppState, command: CreatePolicyCommand) -> Result<SnapshotPolicy, DepotError> {
    command.validate()?;

    // Parse up front so a bad schedule is a 400, not a policy that never
    // fires.
    let next_run = SnapshotRunner::next_run(&command.schedule, Utc::now())?;

    let policy = db::snapshot_policies::create(
        &state.db,
        NewSnapshotPolicy {
            name: command.name,
            dataset: command.dataset,
            schedule: command.schedule,
            retention: command.retention,
            prefix: command.prefix,
            recursive: command.recursive,
            next_run,
        },
    )
    .await?;

    tracing::info!(policy = %policy.id, "snapshot policy created");
    Ok(policy)
}
