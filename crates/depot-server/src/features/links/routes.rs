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
use crate::models::{ShareLink, User};
use crate::state::AppState;

pub fn links_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_links).post(create_link))
        .route("/:id", get(get_link).put(update_link).delete(delete_link))
}

fn ensure_owner(link: &ShareLink, user: &User) -> Result<(), DepotError> {
    if user.is_admin || link.owner_id == user.id {
        Ok(())
    } else {
        Err(DepotError::Forbidden("not your share link".into()))
    }
}

#[tracing::instrument(skip_all)]
async fn list_links(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let links = db::share_links::list_for_owner(&state.db, user.id).await?;
    Ok((StatusCode::OK, Json(links)).into_response())
}

#[tracing::instrument(skip_all)]
async fn create_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(command): Json<create::CreateLinkCommand>,
) -> ApiResult<Response> {
    let link = create::handle(&state, &user, command).await?;
    Ok((StatusCode::CREATED, Json(link)).into_response())
}

#[tracing::instrument(skip_all, fields(link = %id))]
async fn get_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let link = db::share_links::get(&state.db, id).await?;
    ensure_owner(&link, &user)?;
    Ok((StatusCode::OK, Json(link)).into_response())
}

#[tracing::instrument(skip_all, fields(link = %id))]
async fn update_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<db::share_links::ShareLinkPatch>,
) -> ApiResult<Response> {
    let link = db::share_links::get(&state.db, id).await?;
    ensure_owner(&link, &user)?;

    let updated = db::share_links::update(&state.db, id, patch).await?;
    Ok((StatusCode::OK, Json(updated)).into_response())
}

#[tracing::instrument(skip_all, fields(link = %id))]
async fn delete_link(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let link = db::share_links::get(&state.db, id).await?;
    ensure_owner(&link, &user)?;

    db::share_links::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
