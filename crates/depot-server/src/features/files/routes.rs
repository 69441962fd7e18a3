use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use depot_common::DepotError;
use serde::Deserialize;

use super::commands::{delete, mkdir, rename, upload};
use super::queries::{download, list};
use crate::api::{ApiError, ApiResult};
use crate::auth::CurrentUser;
use crate::features::shared::scope;
use crate::state::AppState;

/// Largest direct (non-chunked) upload body.
const MAX_DIRECT_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub fn files_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_by_query))
        .route(
            "/*path",
            get(get_entry)
                .post(upload_file)
                .put(rename_entry)
                .delete(delete_entry),
        )
        .layer(DefaultBodyLimit::max(MAX_DIRECT_UPLOAD_BYTES))
}

pub fn folders_routes() -> Router<AppState> {
    Router::new().route("/*path", post(make_folder))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize, Default)]
struct UploadParams {
    #[serde(default)]
    overwrite: bool,
}

#[tracing::instrument(skip_all)]
async fn list_by_query(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &params.path).await?;
    let entries = list::handle(&state, &user, &scope).await?;
    Ok((StatusCode::OK, Json(entries)).into_response())
}

/// GET on a directory lists it; GET on a file streams it.
#[tracing::instrument(skip_all, fields(path = %path))]
async fn get_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &path).await?;

    // permission first, so a denied caller cannot probe for existence
    scope::authorize(&state, &user, &scope, crate::authz::Action::Read).await?;

    let meta = tokio::fs::metadata(&scope.abs)
        .await
        .map_err(DepotError::from)?;
    if meta.is_dir() {
        let entries = list::handle(&state, &user, &scope).await?;
        return Ok((StatusCode::OK, Json(entries)).into_response());
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());
    Ok(download::handle(&state, &user, &scope, range).await?)
}

#[tracing::instrument(skip_all, fields(path = %path))]
async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &path).await?;
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

#[tracing::instrument(skip_all, fields(path = %path))]
async fn rename_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
    Json(command): Json<rename::RenameCommand>,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &path).await?;
    let response = rename::handle(&state, &user, &scope, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip_all, fields(path = %path))]
async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
    Query(params): Query<delete::DeleteParams>,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &path).await?;
    delete::handle(&state, &user, &scope, params).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[tracing::instrument(skip_all, fields(path = %path))]
async fn make_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(path): Path<String>,
    Query(params): Query<mkdir::MkdirParams>,
) -> ApiResult<Response> {
    let scope = scope::resolve_global(&state, &path).await?;
    let entry = mkdir::handle(&state, &user, &scope, params).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

/// Drain the `file` field of a multipart body.
pub async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(DepotError::Invalid(format!("bad multipart body: {e}"))))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError(DepotError::Invalid(format!("failed to read file field: {e}"))))?;
            return Ok(data.to_vec());
        }
    }

    Err(ApiError(DepotError::Invalid(
        "multipart body must contain a `file` field".into(),
    )))
}
