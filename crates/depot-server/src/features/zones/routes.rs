use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use depot_common::DepotError;
use serde::Deserialize;

use super::commands::bulk;
use super::queries::accessible;
use crate::api::ApiResult;
use crate::auth::CurrentUser;
use crate::features::files::commands::{delete, mkdir, rename, upload};
use crate::features::files::queries::{download, list};
use crate::features::files::routes::read_file_field;
use crate::features::shared::scope;
use crate::state::AppState;

const MAX_DIRECT_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub fn zones_routes() -> Router<AppState> {
    Router::new()
        .route("/accessible", get(accessible_zones))
        .route("/:zone/files", get(list_zone_root))
        // trailing-slash listing of the zone root
        .route("/:zone/files/", get(list_zone_root))
        .route(
            "/:zone/files/*path",
            get(get_entry)
                .post(upload_file)
                .put(rename_entry)
                .delete(delete_entry),
        )
        .route("/:zone/folders/*path", post(make_folder))
        .route("/:zone/bulk/delete", post(bulk_delete))
        .route("/:zone/bulk/move", post(bulk_move))
        .layer(DefaultBodyLimit::max(MAX_DIRECT_UPLOAD_BYTES))
}

#[derive(Deserialize, Default)]
struct UploadParams {
    #[serde(default)]
    overwrite: bool,
}

#[tracing::instrument(skip_all)]
async fn accessible_zones(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let zones = accessible::handle(&state, &user).await?;
    Ok((StatusCode::OK, Json(zones)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone))]
async fn list_zone_root(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(zone): Path<String>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, "").await?;
    let entries = list::handle(&state, &user, &scope).await?;
    Ok((StatusCode::OK, Json(entries)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone, path = %path))]
async fn get_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((zone, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, &path).await?;

    // permission first, so a denied caller cannot probe for existence
    scope::authorize(&state, &user, &scope, crate::authz::Action::Read).await?;

    let meta = tokio::fs::metadata(&scope.abs)
        .await
        .map_err(DepotError::from)?;
    if meta.is_dir() {
        let entries = list::handle(&state, &user, &scope).await?;
        return Ok((StatusCode::OK, Json(entries)).into_response());
    }

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    Ok(download::handle(&state, &user, &scope, range).await?)
}

#[tracing::instrument(skip_all, fields(zone = %zone, path = %path))]
async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((zone, path)): Path<(String, String)>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, &path).await?;
    let content = read_file_field(multipart).await?;

    let entry = upload::handle(
        &state,
        &user,
        &scope,
        upload::UploadFileCommand {
            content,
            overwrite: params.overwrite,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone, path = %path))]
async fn rename_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((zone, path)): Path<(String, String)>,
    Json(command): Json<rename::RenameCommand>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, &path).await?;
    let response = rename::handle(&state, &user, &scope, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone, path = %path))]
async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((zone, path)): Path<(String, String)>,
    Query(params): Query<delete::DeleteParams>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, &path).await?;
    delete::handle(&state, &user, &scope, params).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone, path = %path))]
async fn make_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((zone, path)): Path<(String, String)>,
    Query(params): Query<mkdir::MkdirParams>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, &path).await?;
    let entry = mkdir::handle(&state, &user, &scope, params).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone))]
async fn bulk_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(zone): Path<String>,
    Json(command): Json<bulk::BulkDeleteCommand>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, "").await?;
    let response = bulk::delete(&state, &user, &scope, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip_all, fields(zone = %zone))]
async fn bulk_move(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(zone): Path<String>,
    Json(command): Json<bulk::BulkMoveCommand>,
) -> ApiResult<Response> {
    let scope = scope::resolve_zone(&state, &user, &zone, "").await?;
    let response = bulk::move_entries(&state, &user, &scope, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}
