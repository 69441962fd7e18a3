//! Zones visible to the caller

use depot_common::DepotError;
use serde::Serialize;

use crate::db;
use crate::models::{ShareZone, User, ZoneType};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AccessibleZone {
    pub id: uuid::Uuid,
    pub name: String,
    pub zone_type: ZoneType,
    pub pool_name: String,
    pub read_only: bool,
}

/// Browsable web-visible zones the caller is admitted to. Admins see every
/// zone regardless of allow/deny lists.
#[tracing::instrument(skip(state, user), fields(username = %user.username))]
pub async fn handle(state: &AppState, user: &User) -> Result<Vec<AccessibleZone>, DepotError> {
    let zones = db::zones::list(&state.db).await?;
    let pools = db::pools::list(&state.db).await?;

    let mut accessible = Vec::new();
    for zone in zones {
        if !visible(&zone, user) {
            continue;
        }
        let Some(pool) = pools.iter().find(|p| p.id == zone.pool_id) else {
            continue;
        };
        if !pool.enabled {
            continue;
        }
        accessible.push(AccessibleZone {
            id: zone.id,
            name: zone.name,
            zone_type: zone.zone_type,
            pool_name: pool.name.clone(),
            read_only: zone.read_only,
        });
    }

    Ok(accessible)
}

fn visible(zone: &ShareZone, user: &User) -> bool {
    if user.is_admin {
        return true;
    }
    zone.browsable && zone.allow_web_shares && zone.admits(user)
}
