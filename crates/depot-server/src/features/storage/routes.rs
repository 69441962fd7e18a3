use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::commands::{create_pool, create_zone};
use crate::api::ApiResult;
use crate::db;
use crate::state::AppState;

pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/pools", get(list_pools).post(create_pool_handler))
        .route(
            "/pools/:id",
            get(get_pool).put(update_pool).delete(delete_pool),
        )
        .route("/zones", get(list_zones).post(create_zone_handler))
        .route(
            "/zones/:id",
            get(get_zone).put(update_zone).delete(delete_zone),
        )
}

#[tracing::instrument(skip_all)]
async fn list_pools(State(state): State<AppState>) -> ApiResult<Response> {
    let pools = db::pools::list(&state.db).await?;
    Ok((StatusCode::OK, Json(pools)).into_response())
}

#[tracing::instrument(skip_all)]
async fn create_pool_handler(
    State(state): State<AppState>,
    Json(command): Json<create_pool::CreatePoolCommand>,
) -> ApiResult<Response> {
    let pool = create_pool::handle(&state, command).await?;
    Ok((StatusCode::CREATED, Json(pool)).into_response())
}

#[tracing::instrument(skip_all, fields(pool = %id))]
async fn get_pool(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let pool = db::pools::get(&state.db, id).await?;
    Ok((StatusCode::OK, Json(pool)).into_response())
}

#[tracing::instrument(skip_all, fields(pool = %id))]
async fn update_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<db::pools::PoolPatch>,
) -> ApiResult<Response> {
    let pool = db::pools::update(&state.db, id, patch).await?;
    Ok((StatusCode::OK, Json(pool)).into_response())
}

/// Blocked with `InUse` (409) while zones still reference the pool.
#[tracing::instrument(skip_all, fields(pool = %id))]
async fn delete_pool(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    db::pools::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[tracing::instrument(skip_all)]
async fn list_zones(State(state): State<AppState>) -> ApiResult<Response> {
    let zones = db::zones::list(&state.db).await?;
    Ok((StatusCode::OK, Json(zones)).into_response())
}

#[tracing::instrument(skip_all)]
async fn create_zone_handler(
    State(state): State<AppState>,
    Json(command): Json<create_zone::CreateZoneCommand>,
) -> ApiResult<Response> {
    let zone = create_zone::handle(&state, command).await?;
    Ok((StatusCode::CREATED, Json(zone)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %id))]
async fn get_zone(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let zone = db::zones::get(&state.db, id).await?;
    Ok((StatusCode::OK, Json(zone)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %id))]
async fn update_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<db::zones::ZonePatch>,
) -> ApiResult<Response> {
    let zone = db::zones::update(&state.db, id, patch).await?;
    Ok((StatusCode::OK, Json(zone)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %id))]
async fn delete_zone(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    db::zones::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
