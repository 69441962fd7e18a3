use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::commands::create;
use crate::api::ApiResult;
use crate::db;
use crate::snapshots::SnapshotRunner;
use crate::state::AppState;

pub fn snapshots_routes() -> Router<AppState> {
    Router::new()
        .route("/policies", get(list_policies).post(create_policy))
        .route(
            "/policies/:id",
            get(get_policy).put(update_policy).delete(delete_policy),
        )
        .route("/policies/:id/run", post(run_policy))
}

#[tracing::instrument(skip_all)]
async fn list_policies(State(state): State<AppState>) -> ApiResult<Response> {
    let policies = db::snapshot_policies::list(&state.db).await?;
    Ok((StatusCode::OK, Json(policies)).into_response())
}

#[tracing::instrument(skip_all)]
async fn create_policy(
    State(state): State<AppState>,
    Json(command): Json<create::CreatePolicyCommand>,
) -> ApiResult<Response> {
    let policy = create::handle(&state, command).await?;
    Ok((StatusCode::CREATED, Json(policy)).into_response())
}

#[tracing::instrument(skip_all, fields(policy = %id))]
async fn get_policy(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let policy = db::snapshot_policies::get(&state.db, id).await?;
    Ok((StatusCode::OK, Json(policy)).into_response())
}

#[tracing::instrument(skip_all, fields(policy = %id))]
async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<db::snapshot_policies::SnapshotPolicyPatch>,
) -> ApiResult<Response> {
    let policy = db::snapshot_policies::update(&state.db, id, patch).await?;

    // A schedule edit moves the next firing.
    let next_run = SnapshotRunner::next_run(&policy.schedule, Utc::now())?;
    db::snapshot_policies::set_next_run(&state.db, id, next_run).await?;
    let policy = db::snapshot_policies::get(&state.db, id).await?;

    Ok((StatusCode::OK, Json(policy)).into_response())
}

#[tracing::instrument(skip_all, fields(policy = %id))]
async fn delete_policy(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    db::snapshot_policies::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Fire a policy immediately; races with the scheduler resolve to 409.
#[tracing::instrument(skip_all, fields(policy = %id))]
async fn run_policy(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let policy = db::snapshot_policies::get(&state.db, id).await?;
    state.snapshots.run_policy(&policy).await?;

    let policy = db::snapshot_policies::get(&state.db, id).await?;
    Ok((StatusCode::OK, Json(policy)).into_response())
}
