//! Public share surface tests: liveness, password gate, counters, envelope.

mod common;

use axum::http::StatusCode;
use common::*;
use depot_server::db;

async fn world_with_file() -> (TestWorld, String) {
    let world = TestWorld::new().await;
    tokio::fs::create_dir_all(world.data_dir.path().join("docs"))
        .await
        .unwrap();
    tokio::fs::write(world.data_dir.path().join("docs/report.pdf"), b"report body")
        .await
        .unwrap();
    let (_admin, token) = world.admin().await;
    (world, token)
}

async fn create_link(
    world: &TestWorld,
    owner_token: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let app = world.router();
    body_json(
        expect_status(
            send(&app, post_json("/api/links", Some(owner_token), body)).await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await
}

#[tokio::test]
async fn share_download_respects_max_downloads() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({"target_path": "docs/report.pdf", "max_downloads": 2}),
    )
    .await;
    let share_token = link["token"].as_str().unwrap();
    let app = world.router();

    // two succeed with the body, the third is quota-blocked
    for _ in 0..2 {
        let response = expect_status(
            send(&app, get(&format!("/s/{share_token}/download"), None)).await,
            StatusCode::OK,
        )
        .await;
        assert_eq!(body_bytes(response).await, b"report body".to_vec());
    }
    expect_error(
        send(&app, get(&format!("/s/{share_token}/download"), None)).await,
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
async fn share_summary_hides_secrets_and_is_open() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({"target_path": "docs/report.pdf", "password": "hunter2x"}),
    )
    .await;
    assert!(link.get("password_hash").is_none());
    let share_token = link["token"].as_str().unwrap();
    let app = world.router();

    let summary = body_json(
        expect_status(
            send(&app, get(&format!("/s/{share_token}"), None)).await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(summary["target_name"], "report.pdf");
    assert_eq!(summary["has_password"], true);
    assert!(summary.get("token").is_none());
    assert!(summary.get("password_hash").is_none());
}

#[tokio::test]
async fn password_gate_blocks_until_verified() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({"target_path": "docs/report.pdf", "password": "hunter2x"}),
    )
    .await;
    let share_token = link["token"].as_str().unwrap();
    let app = world.router();

    // locked
    expect_error(
        send(&app, get(&format!("/s/{share_token}/download"), None)).await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // wrong password
    expect_error(
        send(
            &app,
            post_json(
                &format!("/s/{share_token}/verify"),
                None,
                serde_json::json!({"password": "wrong"}),
            ),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // right password yields an unlock token usable in the header
    let verified = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    &format!("/s/{share_token}/verify"),
                    None,
                    serde_json::json!({"password": "hunter2x"}),
                ),
            )
            .await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    let unlock = verified["share_auth"].as_str().unwrap();

    let mut request = get(&format!("/s/{share_token}/download"), None);
    request
        .headers_mut()
        .insert("x-share-auth", unlock.parse().unwrap());
    let response = expect_status(send(&app, request).await, StatusCode::OK).await;
    assert_eq!(body_bytes(response).await, b"report body".to_vec());
}

#[tokio::test]
async fn folder_share_lists_downloads_and_uploads_within_envelope() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({
            "target_path": "docs",
            "allow_listing": true,
            "allow_upload": true
        }),
    )
    .await;
    assert_eq!(link["target_type"], "folder");
    let share_token = link["token"].as_str().unwrap();
    let app = world.router();

    // listing
    let listing = body_json(
        expect_status(
            send(&app, get(&format!("/s/{share_token}/list"), None)).await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(listing[0]["name"], "report.pdf");

    // nested download via ?path=
    let response = expect_status(
        send(&app, get(&format!("/s/{share_token}/download?path=report.pdf"), None)).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body_bytes(response).await, b"report body".to_vec());

    // guest upload lands inside the folder
    expect_status(
        send(
            &app,
            post_multipart(&format!("/s/{share_token}/upload?path=guest.txt"), None, b"hi"),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    assert!(world.data_dir.path().join("docs/guest.txt").exists());

    // the envelope holds: traversal out of the share is rejected
    expect_error(
        send(
            &app,
            get(&format!("/s/{share_token}/download?path=../secret.txt"), None),
        )
        .await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn disabled_and_expired_links_are_dead() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({"target_path": "docs/report.pdf"}),
    )
    .await;
    let share_token = link["token"].as_str().unwrap().to_string();
    let link_id: uuid::Uuid = link["id"].as_str().unwrap().parse().unwrap();
    let app = world.router();

    // disable via the management surface
    expect_status(
        send(
            &app,
            put_json(
                &format!("/api/links/{link_id}"),
                Some(&token),
                serde_json::json!({"enabled": false}),
            ),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    expect_error(
        send(&app, get(&format!("/s/{share_token}"), None)).await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // unknown tokens are plain 404
    expect_error(send(&app, get("/s/no-such-token", None)).await, StatusCode::NOT_FOUND).await;

    // deadline in the past kills a re-enabled link
    db::share_links::update(
        &world.db,
        link_id,
        db::share_links::ShareLinkPatch {
            enabled: Some(true),
            expires_at: Some(Some(chrono::Utc::now() - chrono::Duration::seconds(1))),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    expect_error(
        send(&app, get(&format!("/s/{share_token}"), None)).await,
        StatusCode::FORBIDDEN,
    )
    .await;
}

#[tokio::test]
async fn links_are_owner_scoped() {
    let (world, token) = world_with_file().await;
    let link = create_link(
        &world,
        &token,
        serde_json::json!({"target_path": "docs/report.pdf"}),
    )
    .await;
    let link_id = link["id"].as_str().unwrap();
    let app = world.router();

    let outsider = world.create_user("outsider", "outsider-pw1", false, &[]).await;
    let outsider_token = world.token_for(&outsider).await;

    expect_error(
        send(&app, get(&format!("/api/links/{link_id}"), Some(&outsider_token))).await,
        StatusCode::FORBIDDEN,
    )
    .await;
    let own_links = body_json(send(&app, get("/api/links", Some(&outsider_token))).await).await;
    assert_eq!(own_links, serde_json::json!([]));
}
