use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::commands::{create, finalize};
use crate::api::ApiResult;
use crate::auth::CurrentUser;
use crate::state::AppState;

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(create_session))
        .route("/sessions", get(list_sessions))
        .route(
            "/session/:id",
            get(progress).delete(cancel),
        )
        .route("/session/:id/chunk/:index", post(receive_chunk))
        .route("/session/:id/finalize", post(finalize_session))
        // chunk bodies are raw octet-stream up to the chunk ceiling
        .layer(DefaultBodyLimit::max(create::MAX_CHUNK_SIZE as usize + 1024))
}

#[tracing::instrument(skip_all)]
async fn create_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(command): Json<create::CreateUploadCommand>,
) -> ApiResult<Response> {
    let session = create::handle(&state, &user, command).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

#[tracing::instrument(skip_all)]
async fn list_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let sessions = state.uploads.list_for_owner(user.id).await?;
    Ok((StatusCode::OK, Json(sessions)).into_response())
}

#[tracing::instrument(skip_all, fields(session = %id))]
async fn progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let session = state.uploads.get(id).await?;
    create::ensure_owner(session.owner_id, &user)?;

    let progress = state.uploads.progress(id).await?;
    Ok((StatusCode::OK, Json(progress)).into_response())
}

#[tracing::instrument(skip_all, fields(session = %id, chunk = index))]
async fn receive_chunk(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, index)): Path<(Uuid, i64)>,
    body: Bytes,
) -> ApiResult<Response> {
    let session = state.uploads.get(id).await?;
    create::ensure_owner(session.owner_id, &user)?;

    let session = state.uploads.receive_chunk(id, index, &body).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "received": session.received_count(),
            "total": session.total_chunks,
        })),
    )
        .into_response())
}

#[tracing::instrument(skip_all, fields(session = %id))]
async fn finalize_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let response = finalize::handle(&state, &user, id).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip_all, fields(session = %id))]
async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let session = state.uploads.get(id).await?;
    create::ensure_owner(session.owner_id, &user)?;

    state.uploads.cancel(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
