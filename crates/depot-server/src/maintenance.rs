//! Periodic maintenance sweeps
//!
//! One background loop handles the three expiry sweeps: bearer sessions
//! past their expiry, share links past their deadline, and upload sessions
//! idle past the TTL (including their temp directories). Each sweep is
//! idempotent, so a crash between sweeps costs nothing.

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;

use crate::db;
use crate::state::AppState;

/// Run one sweep cycle now.
pub async fn sweep_once(state: &AppState) -> Result<SweepReport, depot_common::DepotError> {
    let now = Utc::now();

    let sessions = db::sessions::clean_expired(&state.db, now).await?;
    let share_links = db::share_links::clean_expired(&state.db, now).await?;

    let cutoff = now - Duration::hours(state.config.storage.upload_session_ttl_hours);
    let upload_sessions = state.uploads.collect_stale(cutoff).await?;

    Ok(SweepReport {
        sessions,
        share_links,
        upload_sessions,
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub share_links: u64,
    pub upload_sessions: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.sessions == 0 && self.share_links == 0 && self.upload_sessions == 0
    }
}

/// Spawn the sweep loop.
pub fn start_sweeper(state: AppState) -> JoinHandle<()> {
    let period = std::time::Duration::from_secs(state.config.storage.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        tracing::info!(period_secs = period.as_secs(), "maintenance sweeper started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match sweep_once(&state).await {
                Ok(report) if !report.is_empty() => {
                    tracing::info!(
                        sessions = report.sessions,
                        share_links = report.share_links,
                        upload_sessions = report.upload_sessions,
                        "maintenance sweep"
                    );
                },
                Ok(_) => {},
                Err(e) => tracing::error!(error = %e, "maintenance sweep failed"),
            }
        }
    })
}
