use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

use super::commands::stream;
use crate::api::ApiResult;
use crate::db;
use crate::state::AppState;

pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(list_settings).put(put_setting))
        .route("/command", post(run_command))
}

#[tracing::instrument(skip_all)]
async fn list_settings(State(state): State<AppState>) -> ApiResult<Response> {
    let settings = db::settings::list(&state.db).await?;
    Ok((StatusCode::OK, Json(settings)).into_response())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PutSettingCommand {
    key: String,
    value: String,
    #[serde(default = "default_type")]
    value_type: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_type() -> String {
    "string".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

#[tracing::instrument(skip_all, fields(key = %command.key))]
async fn put_setting(
    State(state): State<AppState>,
    Json(command): Json<PutSettingCommand>,
) -> ApiResult<Response> {
    if command.key.trim().is_empty() {
        return Err(depot_common::DepotError::Invalid("key is required".into()).into());
    }

    let setting = db::settings::set(
        &state.db,
        &command.key,
        &command.value,
        &command.value_type,
        &command.category,
    )
    .await?;
    Ok((StatusCode::OK, Json(setting)).into_response())
}

/// One command per request, streamed back as SSE. The `complete` event is
/// always last.
#[tracing::instrument(skip_all, fields(command = %request.command))]
async fn run_command(
    State(_state): State<AppState>,
    Json(request): Json<stream::RunCommandRequest>,
) -> ApiResult<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>> {
    let events = stream::run(request)?;

    let sse_stream = events.map(|event| {
        let name = event.event_name();
        let event = Event::default()
            .event(name)
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().event(name));
        Ok(event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
