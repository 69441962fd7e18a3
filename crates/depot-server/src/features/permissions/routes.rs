use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::commands::grant;
use crate::api::ApiResult;
use crate::db;
use crate::state::AppState;

pub fn permissions_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_permissions).post(grant_permission))
        .route("/:id", axum::routing::delete(revoke_permission))
}

#[tracing::instrument(skip_all)]
async fn list_permissions(State(state): State<AppState>) -> ApiResult<Response> {
    let permissions = db::permissions::list(&state.db).await?;
    Ok((StatusCode::OK, Json(permissions)).into_response())
}

#[tracing::instrument(skip_all)]
async fn grant_permission(
    State(state): State<AppState>,
    Json(command): Json<grant::GrantCommand>,
) -> ApiResult<Response> {
    let permission = grant::handle(&state, command).await?;
    Ok((StatusCode::CREATED, Json(permission)).into_response())
}

#[tracing::instrument(skip_all, fields(permission = %id))]
async fn revoke_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    db::permissions::revoke(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
