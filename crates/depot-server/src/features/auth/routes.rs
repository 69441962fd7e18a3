use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commands::{change_password, login, setup};
use crate::api::ApiResult;
use crate::auth::middleware::{AuthToken, CurrentUser};
use crate::db;
use crate::models::User;
use crate::state::AppState;

/// The whole auth tree. Login and the setup gate are open; the rest sits
/// behind the bearer gate, wired here because this feature is the one tree
/// with a public/protected split inside a single prefix.
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/change-password", post(change_password_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            crate::auth::middleware::require_auth,
        ));

    Router::new()
        .route("/login", post(login_handler))
        .route("/setup", get(setup_status).post(run_setup))
        .merge(protected)
}

#[tracing::instrument(skip_all)]
async fn login_handler(
    State(state): State<AppState>,
    Json(command): Json<login::LoginCommand>,
) -> ApiResult<Response> {
    let response = login::handle(state, command).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

#[tracing::instrument(skip_all)]
async fn logout(State(state): State<AppState>, AuthToken(token): AuthToken) -> ApiResult<Response> {
    db::sessions::delete(&state.db, &token).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Serialize)]
struct RefreshResponse {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[tracing::instrument(skip_all, fields(username = %user.username))]
async fn refresh(
    State(state): State<AppState>,
    AuthToken(old_token): AuthToken,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let (token, expires_at) = state.signer.mint(
        user.id,
        &user.username,
        user.is_admin,
        state.config.auth.session_ttl_hours,
    )?;

    db::sessions::insert(&state.db, &token, user.id, expires_at).await?;
    db::sessions::delete(&state.db, &old_token).await?;

    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            token,
            expires_at,
            user,
        }),
    )
        .into_response())
}

async fn me(CurrentUser(user): CurrentUser) -> ApiResult<Response> {
    Ok((StatusCode::OK, Json(user)).into_response())
}

#[tracing::instrument(skip_all)]
async fn change_password_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(command): Json<change_password::ChangePasswordCommand>,
) -> ApiResult<Response> {
    change_password::handle(state, &user, command).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn setup_status(State(state): State<AppState>) -> ApiResult<Response> {
    let status = setup::status(&state).await?;
    Ok((StatusCode::OK, Json(status)).into_response())
}

#[tracing::instrument(skip_all)]
async fn run_setup(
    State(state): State<AppState>,
    Json(command): Json<setup::SetupCommand>,
) -> ApiResult<Response> {
    let admin = setup::handle(state, command).await?;
    Ok((StatusCode::CREATED, Json(admin)).into_response())
}
