use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::queries::usage;
use crate::api::ApiResult;
use crate::state::AppState;

pub fn quotas_routes() -> Router<AppState> {
    Router::new().route("/usage", get(usage_report))
}

#[tracing::instrument(skip_all)]
async fn usage_report(State(state): State<AppState>) -> ApiResult<Response> {
    let report = usage::handle(&state).await?;
    Ok((StatusCode::OK, Json(report)).into_response())
}
