//! Authentication and admin gates
//!
//! `require_auth` wraps the protected API tree: it verifies the bearer
//! token's signature and expiry, then confirms the session row still exists
//! (the dual gate), then loads a fresh user record so deletions and group
//! changes bite immediately. The effective admin flag is computed here once
//! and carried in the request extensions.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use depot_common::DepotError;

use super::is_effective_admin;
use crate::api::ApiError;
use crate::db;
use crate::models::User;
use crate::state::AppState;

/// The authenticated caller, with `is_admin` already effective.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError(DepotError::Unauthenticated("authentication required".into())))
    }
}

fn bearer_token(request: &Request) -> Result<&str, DepotError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| DepotError::Unauthenticated("missing bearer token".into()))
}

/// Resolve a bearer token to its user, or fail. Shared by the middleware
/// and the auth feature (refresh/logout/me need the same checks).
pub async fn authenticate_token(state: &AppState, token: &str) -> Result<User, DepotError> {
    let claims = state.signer.verify(token)?;

    let session = db::sessions::get(&state.db, token)
        .await
        .map_err(DepotError::from)?
        .ok_or_else(|| DepotError::Unauthenticated("session revoked".into()))?;

    if !session.is_valid(Utc::now()) {
        return Err(DepotError::Unauthenticated("session expired".into()));
    }

    let mut user = db::users::get(&state.db, claims.sub)
        .await
        .map_err(|_| DepotError::Unauthenticated("user no longer exists".into()))?;

    user.is_admin = is_effective_admin(&user, &state.config.auth);
    Ok(user)
}

/// Middleware for the protected `/api/**` tree.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).map_err(ApiError)?.to_string();
    let user = authenticate_token(&state, &token).await.map_err(ApiError)?;

    request.extensions_mut().insert(AuthToken(token));
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Middleware for admin subtrees; layered inside `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError(DepotError::Unauthenticated("authentication required".into())))?;

    if !user.0.is_admin {
        return Err(ApiError(DepotError::Forbidden(
            "administrator access required".into(),
        )));
    }

    Ok(next.run(request).await)
}

/// The raw bearer token of the current request (logout/refresh need it).
#[derive(Debug, Clone)]
pub struct AuthToken(pub String);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthToken>()
            .cloned()
            .ok_or_else(|| ApiError(DepotError::Unauthenticated("authentication required".into())))
    }
}
