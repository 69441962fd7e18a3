use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use depot_common::DepotError;
use serde::{Deserialize, Serialize};

use super::access;
use crate::api::ApiResult;
use crate::auth::identity;
use crate::db;
use crate::features::files::queries::download::stream_file;
use crate::features::files::routes::read_file_field;
use crate::fsgate::WriteMode;
use crate::models::TargetType;
use crate::state::AppState;

const MAX_SHARE_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub fn shares_routes() -> Router<AppState> {
    Router::new()
        .route("/:token", get(summary))
        .route("/:token/verify", post(verify_password))
        .route("/:token/list", get(list_entries))
        .route("/:token/download", get(download_entry))
        .route("/:token/preview", get(preview_entry))
        .route("/:token/upload", post(upload_entry))
        .layer(DefaultBodyLimit::max(MAX_SHARE_UPLOAD_BYTES))
}

#[derive(Deserialize, Default)]
struct SubpathParams {
    #[serde(default)]
    path: String,
}

/// Safe public view of a link: no token echo beyond the URL, no hashes, no
/// counters that would reveal limits to strangers.
#[derive(Serialize)]
struct ShareSummary {
    target_name: String,
    target_type: TargetType,
    has_password: bool,
    allow_download: bool,
    allow_preview: bool,
    allow_upload: bool,
    allow_listing: bool,
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

#[tracing::instrument(skip_all)]
async fn summary(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;

    let owner = if link.show_owner {
        db::users::get(&state.db, link.owner_id)
            .await
            .ok()
            .map(|u| u.username)
    } else {
        None
    };

    db::share_links::touch(&state.db, link.id).await?;

    Ok((
        StatusCode::OK,
        Json(ShareSummary {
            target_name: link.target_name.clone(),
            target_type: link.target_type,
            has_password: link.has_password(),
            allow_download: link.allow_download,
            allow_preview: link.allow_preview,
            allow_upload: link.allow_upload,
            allow_listing: link.allow_listing,
            expires_at: link.expires_at,
            owner,
        }),
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifyCommand {
    password: String,
}

#[tracing::instrument(skip_all)]
async fn verify_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(command): Json<VerifyCommand>,
) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;

    let Some(hash) = link.password_hash.as_deref().filter(|h| !h.is_empty()) else {
        return Err(DepotError::Invalid("share link has no password".into()).into());
    };

    if !identity::verify_password(&command.password, hash).await? {
        return Err(DepotError::Forbidden("wrong share password".into()).into());
    }

    let unlock = state.signer.mint_share_unlock(link.id)?;
    let cookie = format!(
        "{}={}; Path=/s/{}; HttpOnly; SameSite=Strict",
        access::UNLOCK_COOKIE,
        unlock,
        link.token
    );

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({ "share_auth": unlock })),
    )
        .into_response();
    if let Ok(value) = header::HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

#[tracing::instrument(skip_all)]
async fn list_entries(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<SubpathParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;
    access::require_unlocked(&state, &link, &headers)?;

    if !link.allow_listing {
        return Err(DepotError::Forbidden("listing is not enabled for this share".into()).into());
    }
    if link.target_type != TargetType::Folder {
        return Err(DepotError::Invalid("share target is a single file".into()).into());
    }

    let abs = access::resolve_subpath(&link, &params.path)?;
    let entries = state.fsgate.list(&abs, &params.path).await?;

    db::share_links::touch(&state.db, link.id).await?;
    Ok((StatusCode::OK, Json(entries)).into_response())
}

#[tracing::instrument(skip_all)]
async fn download_entry(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<SubpathParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;
    access::require_unlocked(&state, &link, &headers)?;

    if !link.allow_download {
        return Err(DepotError::Forbidden("downloads are not enabled for this share".into()).into());
    }

    let abs = access::resolve_subpath(&link, &params.path)?;
    let meta = tokio::fs::metadata(&abs).await.map_err(DepotError::from)?;
    if meta.is_dir() {
        return Err(DepotError::Invalid("cannot download a directory".into()).into());
    }

    // Claim the slot before the first byte leaves; the conditional UPDATE
    // keeps concurrent downloads at or under the cap.
    if !db::share_links::increment_download(&state.db, link.id).await? {
        return Err(DepotError::QuotaExceeded("download limit reached".into()).into());
    }

    let file_name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| link.target_name.clone());
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    Ok(stream_file(&state.fsgate, &abs, &file_name, range, false).await?)
}

#[tracing::instrument(skip_all)]
async fn preview_entry(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<SubpathParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;
    access::require_unlocked(&state, &link, &headers)?;

    if !link.allow_preview {
        return Err(DepotError::Forbidden("previews are not enabled for this share".into()).into());
    }

    let abs = access::resolve_subpath(&link, &params.path)?;
    let meta = tokio::fs::metadata(&abs).await.map_err(DepotError::from)?;
    if meta.is_dir() {
        return Err(DepotError::Invalid("cannot preview a directory".into()).into());
    }

    if !db::share_links::increment_view(&state.db, link.id).await? {
        return Err(DepotError::QuotaExceeded("view limit reached".into()).into());
    }

    let file_name = abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| link.target_name.clone());
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    Ok(stream_file(&state.fsgate, &abs, &file_name, range, true).await?)
}

#[tracing::instrument(skip_all)]
async fn upload_entry(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<SubpathParams>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Response> {
    let link = access::load_live(&state, &token).await?;
    access::require_unlocked(&state, &link, &headers)?;

    if !link.allow_upload {
        return Err(DepotError::Forbidden("uploads are not enabled for this share".into()).into());
    }
    if link.target_type != TargetType::Folder {
        return Err(DepotError::Invalid("uploads require a folder target".into()).into());
    }

    if params.path.trim().is_empty() {
        return Err(DepotError::Invalid("path must name the file to create".into()).into());
    }

    let abs = access::resolve_subpath(&link, &params.path)?;
    let content = read_file_field(multipart).await?;

    if let Some(parent) = abs.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(DepotError::from)?;
    }
    // Guests never overwrite existing files.
    state
        .fsgate
        .write_all(&abs, WriteMode::CreateNew, &content)
        .await?;

    db::share_links::touch(&state.db, link.id).await?;

    tracing::info!(link = %link.id, path = %params.path, size = content.len(), "share upload");
    Ok(StatusCode::CREATED.into_response())
}
