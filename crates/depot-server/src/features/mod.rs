//! Feature modules implementing the depot API
//!
//! Each feature is a vertical slice: HTTP routes plus the commands and
//! queries behind them.
//!
//! - **auth**: login/logout/refresh/me, password rotation, first-run setup
//! - **files**: the legacy global file tree rooted at the data directory
//! - **zones**: accessible-zone discovery and zone-scoped file operations
//! - **uploads**: resumable chunked-upload sessions
//! - **links**: share-link management (owner-scoped)
//! - **shares**: the anonymous `/s/{token}` surface
//! - **permissions**: admin grant management
//! - **admin_users**: admin user management
//! - **storage**: admin pool/zone management
//! - **quotas**: admin usage reporting
//! - **system**: settings and the privileged-command streamer
//! - **snapshots**: snapshot policy administration
//!
//! Middleware order, outermost first: CORS, request tracing, compression,
//! then per-tree auth gates (bearer for `/api/**` except login/setup; the
//! admin gate wraps the admin subtrees; `/s/**` and `/health` are public).

pub mod admin_users;
pub mod auth;
pub mod files;
pub mod links;
pub mod permissions;
pub mod quotas;
pub mod shared;
pub mod shares;
pub mod snapshots;
pub mod storage;
pub mod system;
pub mod uploads;
pub mod zones;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::compression::CompressionLayer;

use crate::auth::middleware::{require_admin, require_auth};
use crate::state::AppState;

/// Assemble the full application router.
pub fn router(state: AppState) -> Router {
    let admin_api = Router::new()
        .nest("/admin/users", admin_users::admin_users_routes())
        .nest("/permissions", permissions::permissions_routes())
        .nest("/storage", storage::storage_routes())
        .nest("/quotas", quotas::quotas_routes())
        .nest(
            "/system",
            system::system_routes().nest("/snapshots", snapshots::snapshots_routes()),
        )
        .layer(from_fn(require_admin));

    let protected_api = Router::new()
        .nest("/files", files::files_routes())
        .nest("/folders", files::folders_routes())
        .nest("/zones", zones::zones_routes())
        .nest("/upload", uploads::upload_routes())
        .nest("/links", links::links_routes())
        .merge(admin_api)
        .layer(from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .nest("/auth", auth::auth_routes(state.clone()))
        .merge(protected_api);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .nest("/s", shares::shares_routes())
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(crate::middleware::tracing_layer())
        .layer(crate::middleware::cors_layer(&state.config.cors))
        .with_state(state)
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        },
    }
}
