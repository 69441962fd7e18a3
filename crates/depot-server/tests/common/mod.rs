//! Shared fixtures for the integration tests
//!
//! Each test gets an isolated world: an in-memory metadata database, a
//! temp directory standing in for DATA_DIR, and the full router. Requests
//! are driven through `tower::ServiceExt::oneshot`, no sockets involved.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use depot_server::auth::StoreIdentity;
use depot_server::config::{AuthConfig, Config};
use depot_server::db;
use depot_server::features;
use depot_server::models::User;
use depot_server::snapshots::{SnapshotRunner, ZfsCli};
use depot_server::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-integration";

pub struct TestWorld {
    pub state: AppState,
    pub db: SqlitePool,
    /// Keeps DATA_DIR alive for the test's duration.
    pub data_dir: TempDir,
}

impl TestWorld {
    pub async fn new() -> Self {
        let data_dir = TempDir::new().expect("tempdir");
        let db = db::connect_memory().await.expect("in-memory db");

        let mut config = Config::default();
        config.auth = AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            session_ttl_hours: 24,
            use_pam: false,
            admin_groups: vec!["wheel".into(), "admin".into()],
        };
        config.storage.data_dir = data_dir.path().to_path_buf();

        let identity = Arc::new(StoreIdentity::new(db.clone()));
        let snapshots = Arc::new(SnapshotRunner::new(db.clone(), Arc::new(ZfsCli::new())));
        let state = AppState::new(db.clone(), Arc::new(config), identity, snapshots);
        state.uploads.init().await.expect("uploads dir");

        Self {
            state,
            db,
            data_dir,
        }
    }

    pub fn router(&self) -> axum::Router {
        features::router(self.state.clone())
    }

    /// Create a user straight in the store with a bcrypt hash for
    /// `password`.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
        groups: &[&str],
    ) -> User {
        let hash = bcrypt::hash(password, 4).expect("hash");
        db::users::create(
            &self.db,
            db::users::NewUser {
                username: username.to_string(),
                password_hash: hash,
                email: format!("{username}@example.com"),
                is_admin,
                groups: groups.iter().map(|s| s.to_string()).collect(),
                must_change_password: false,
            },
        )
        .await
        .expect("create user")
    }

    /// Mint a bearer token + session row for a user, as login would.
    pub async fn token_for(&self, user: &User) -> String {
        let (token, expires_at) = self
            .state
            .signer
            .mint(user.id, &user.username, user.is_admin, 24)
            .expect("mint");
        db::sessions::insert(&self.db, &token, user.id, expires_at)
            .await
            .expect("session row");
        token
    }

    /// Admin + token in one call.
    pub async fn admin(&self) -> (User, String) {
        let user = self.create_user("admin", "admin-password", true, &[]).await;
        let token = self.token_for(&user).await;
        (user, token)
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, None, None)
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    request("DELETE", uri, token, None, None)
}

pub fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    request(
        "POST",
        uri,
        token,
        Some(Body::from(body.to_string())),
        Some("application/json"),
    )
}

pub fn put_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    request(
        "PUT",
        uri,
        token,
        Some(Body::from(body.to_string())),
        Some("application/json"),
    )
}

pub fn post_bytes(uri: &str, token: Option<&str>, bytes: Vec<u8>) -> Request<Body> {
    request(
        "POST",
        uri,
        token,
        Some(Body::from(bytes)),
        Some("application/octet-stream"),
    )
}

/// Minimal multipart body with a single `file` field.
pub fn post_multipart(uri: &str, token: Option<&str>, content: &[u8]) -> Request<Body> {
    let boundary = "depot-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"upload.bin\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let content_type = format!("multipart/form-data; boundary={boundary}");
    request("POST", uri, token, Some(Body::from(body)), Some(&content_type))
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Body>,
    content_type: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(body.unwrap_or_else(Body::empty))
        .expect("request")
}

pub async fn send(router: &axum::Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("response")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn expect_status(response: Response<Body>, expected: StatusCode) -> Response<Body> {
    assert_eq!(response.status(), expected, "unexpected status");
    response
}

/// Shorthand for asserting the wire error shape.
pub async fn expect_error(response: Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
    let body = body_json(response).await;
    assert!(body.get("error").is_some(), "error body missing: {body}");
}

pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}
