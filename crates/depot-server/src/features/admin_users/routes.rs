use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use depot_common::DepotError;
use uuid::Uuid;

use super::commands::create;
use crate::api::ApiResult;
use crate::auth::CurrentUser;
use crate::db;
use crate::state::AppState;

pub fn admin_users_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

#[tracing::instrument(skip_all)]
async fn list_users(State(state): State<AppState>) -> ApiResult<Response> {
    let users = db::users::list(&state.db).await?;
    Ok((StatusCode::OK, Json(users)).into_response())
}

#[tracing::instrument(skip_all)]
async fn create_user(
    State(state): State<AppState>,
    Json(command): Json<create::CreateUserCommand>,
) -> ApiResult<Response> {
    let user = create::handle(&state, command).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

#[tracing::instrument(skip_all, fields(user = %id))]
async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Response> {
    let user = db::users::get(&state.db, id).await?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

#[tracing::instrument(skip_all, fields(user = %id))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<db::users::UserPatch>,
) -> ApiResult<Response> {
    let user = db::users::update(&state.db, id, patch).await?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

/// Deleting a user cascades to their sessions, logging them out everywhere.
/// Self-deletion is blocked so an instance always keeps one administrator.
#[tracing::instrument(skip_all, fields(user = %id))]
async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    if caller.id == id {
        return Err(DepotError::Invalid("cannot delete your own account".into()).into());
    }

    db::users::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
