//! Disk usage per zone
//!
//! Walks each zone's tree and reports apparent bytes next to the
//! configured quota knobs. Zones whose roots fail to resolve are reported
//! with an error string instead of sinking the whole report.

use depot_common::paths;
use depot_common::DepotError;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use crate::db;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ZoneUsage {
    pub zone_id: Uuid,
    pub zone_name: String,
    pub pool_name: String,
    pub bytes_used: Option<u64>,
    pub max_quota_per_user: i64,
    pub default_user_quota: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn handle(state: &AppState) -> Result<Vec<ZoneUsage>, DepotError> {
    let zones = db::zones::list(&state.db).await?;
    let pools = db::pools::list(&state.db).await?;

    let mut report = Vec::with_capacity(zones.len());
    for zone in zones {
        let Some(pool) = pools.iter().find(|p| p.id == zone.pool_id) else {
            continue;
        };

        let usage = match paths::resolve(Path::new(&pool.path), &zone.path) {
            Ok(root) => match state.fsgate.tree_size(&root).await {
                Ok(bytes) => (Some(bytes), None),
                Err(e) => (None, Some(e.to_string())),
            },
            Err(e) => (None, Some(e.to_string())),
        };

        report.push(ZoneUsage {
            zone_id: zone.id,
            zone_name: zone.name,
            pool_name: pool.name.clone(),
            bytes_used: usage.0,
            max_quota_per_user: zone.max_quota_per_user,
            default_user_quota: pool.default_user_quota,
            error: usage.1,
        });
    }

    Ok(report)
}
