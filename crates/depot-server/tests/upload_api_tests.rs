//! Resumable upload flow over the API, including the reconnect scenario.

mod common;

use axum::http::StatusCode;
use common::*;

const CHUNK: i64 = 512 * 1024;

fn chunk_bytes(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

#[tokio::test]
async fn chunked_upload_survives_reconnect_and_publishes() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;
    let app = world.router();

    // 2.25 chunks -> 3 chunks total
    let total_size = CHUNK * 2 + CHUNK / 4;
    let session = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    "/api/upload/session",
                    Some(&token),
                    serde_json::json!({
                        "file_name": "report.pdf",
                        "total_size": total_size,
                        "chunk_size": CHUNK
                    }),
                ),
            )
            .await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["total_chunks"], 3);

    // chunks 0 and 1, then "disconnect"
    for (index, byte) in [(0u8, b'a'), (1, b'b')] {
        expect_status(
            send(
                &app,
                post_bytes(
                    &format!("/api/upload/session/{id}/chunk/{index}"),
                    Some(&token),
                    chunk_bytes(byte, CHUNK as usize),
                ),
            )
            .await,
            StatusCode::OK,
        )
        .await;
    }

    // reconnect: progress shows 2/3
    let progress = body_json(
        expect_status(
            send(&app, get(&format!("/api/upload/session/{id}"), Some(&token))).await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(progress["received"], 2);
    assert_eq!(progress["total"], 3);
    assert_eq!(progress["bytes"], CHUNK * 2);

    // finalize too early fails, session stays usable
    expect_error(
        send(
            &app,
            post_json(
                &format!("/api/upload/session/{id}/finalize"),
                Some(&token),
                serde_json::json!({}),
            ),
        )
        .await,
        StatusCode::BAD_REQUEST,
    )
    .await;

    // tail chunk then finalize
    expect_status(
        send(
            &app,
            post_bytes(
                &format!("/api/upload/session/{id}/chunk/2"),
                Some(&token),
                chunk_bytes(b'c', (CHUNK / 4) as usize),
            ),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    let finalized = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    &format!("/api/upload/session/{id}/finalize"),
                    Some(&token),
                    serde_json::json!({}),
                ),
            )
            .await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(finalized["entry"]["size"], total_size);
    assert_eq!(finalized["entry"]["name"], "report.pdf");

    // published bytes are the chunks in order
    let published = tokio::fs::read(world.data_dir.path().join("report.pdf"))
        .await
        .unwrap();
    assert_eq!(published.len() as i64, total_size);
    assert_eq!(published[0], b'a');
    assert_eq!(published[CHUNK as usize], b'b');
    assert_eq!(published[(2 * CHUNK) as usize], b'c');

    // second finalize conflicts; session no longer listed
    expect_error(
        send(
            &app,
            post_json(
                &format!("/api/upload/session/{id}/finalize"),
                Some(&token),
                serde_json::json!({}),
            ),
        )
        .await,
        StatusCode::CONFLICT,
    )
    .await;
    let sessions = body_json(send(&app, get("/api/upload/sessions", Some(&token))).await).await;
    assert_eq!(sessions, serde_json::json!([]));
}

#[tokio::test]
async fn upload_sessions_are_owner_scoped() {
    let world = TestWorld::new().await;
    let (_admin, admin_token) = world.admin().await;
    let app = world.router();

    let session = body_json(
        send(
            &app,
            post_json(
                "/api/upload/session",
                Some(&admin_token),
                serde_json::json!({
                    "file_name": "secret.bin",
                    "total_size": CHUNK,
                    "chunk_size": CHUNK
                }),
            ),
        )
        .await,
    )
    .await;
    let id = session["id"].as_str().unwrap();

    let intruder = world.create_user("intruder", "intruder-pw1", false, &[]).await;
    let intruder_token = world.token_for(&intruder).await;

    expect_error(
        send(&app, get(&format!("/api/upload/session/{id}"), Some(&intruder_token))).await,
        StatusCode::FORBIDDEN,
    )
    .await;
    expect_error(
        send(
            &app,
            post_bytes(
                &format!("/api/upload/session/{id}/chunk/0"),
                Some(&intruder_token),
                chunk_bytes(b'x', CHUNK as usize),
            ),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
async fn cancel_frees_the_session() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;
    let app = world.router();

    let session = body_json(
        send(
            &app,
            post_json(
                "/api/upload/session",
                Some(&token),
                serde_json::json!({
                    "file_name": "willcancel.bin",
                    "total_size": CHUNK,
                    "chunk_size": CHUNK
                }),
            ),
        )
        .await,
    )
    .await;
    let id = session["id"].as_str().unwrap();

    expect_status(
        send(&app, delete(&format!("/api/upload/session/{id}"), Some(&token))).await,
        StatusCode::NO_CONTENT,
    )
    .await;

    // cancelled sessions refuse chunks
    expect_error(
        send(
            &app,
            post_bytes(
                &format!("/api/upload/session/{id}/chunk/0"),
                Some(&token),
                chunk_bytes(b'x', CHUNK as usize),
            ),
        )
        .await,
        StatusCode::CONFLICT,
    )
    .await;
}

/// Finalize runs the same write gate as direct uploads: publishing into a
/// read-only zone is rejected and the session stays active for a retry
/// against a corrected destination.
#[tokio::test]
async fn finalize_into_read_only_zone_is_rejected() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;

    let pool_root = world.data_dir.path().join("ro-pool");
    tokio::fs::create_dir_all(pool_root.join("frozen")).await.unwrap();
    let pool_root = pool_root.canonicalize().unwrap();

    let app = world.router();

    let pool = body_json(
        send(
            &app,
            post_json(
                "/api/storage/pools",
                Some(&token),
                serde_json::json!({"name": "ro", "path": pool_root.to_str().unwrap()}),
            ),
        )
        .await,
    )
    .await;
    body_json(
        send(
            &app,
            post_json(
                "/api/storage/zones",
                Some(&token),
                serde_json::json!({
                    "name": "frozen",
                    "pool_id": pool["id"],
                    "path": "frozen",
                    "zone_type": "group",
                    "read_only": true
                }),
            ),
        )
        .await,
    )
    .await;

    // chunks may still arrive; the write gate bites at publish time
    let session = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    "/api/upload/session",
                    Some(&token),
                    serde_json::json!({
                        "zone": "frozen",
                        "file_name": "late.bin",
                        "total_size": CHUNK,
                        "chunk_size": CHUNK
                    }),
                ),
            )
            .await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await;
    let id = session["id"].as_str().unwrap();

    expect_status(
        send(
            &app,
            post_bytes(
                &format!("/api/upload/session/{id}/chunk/0"),
                Some(&token),
                chunk_bytes(b'z', CHUNK as usize),
            ),
        )
        .await,
        StatusCode::OK,
    )
    .await;

    expect_error(
        send(
            &app,
            post_json(
                &format!("/api/upload/session/{id}/finalize"),
                Some(&token),
                serde_json::json!({}),
            ),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // nothing was published and the session is still active
    assert!(!pool_root.join("frozen/late.bin").exists());
    let sessions = body_json(send(&app, get("/api/upload/sessions", Some(&token))).await).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["state"], "active");
}

#[tokio::test]
async fn invalid_session_parameters_are_rejected() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;
    let app = world.router();

    // zero chunk size
    expect_error(
        send(
            &app,
            post_json(
                "/api/upload/session",
                Some(&token),
                serde_json::json!({"file_name": "x", "total_size": 10, "chunk_size": 0}),
            ),
        )
        .await,
        StatusCode::BAD_REQUEST,
    )
    .await;

    // path separator in file name
    expect_error(
        send(
            &app,
            post_json(
                "/api/upload/session",
                Some(&token),
                serde_json::json!({"file_name": "../x", "total_size": 10, "chunk_size": CHUNK}),
            ),
        )
        .await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}
