//! File-surface tests: global tree, zone scoping, permission enforcement.

mod common;

use axum::http::{header, StatusCode};
use common::*;

#[tokio::test]
async fn global_file_lifecycle() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;
    let app = world.router();

    // empty listing is [], not null
    let listing = body_json(
        expect_status(send(&app, get("/api/files?path=", Some(&token))).await, StatusCode::OK).await,
    )
    .await;
    assert_eq!(listing, serde_json::json!([]));

    // mkdir, upload, list
    expect_status(
        send(&app, post_json("/api/folders/docs", Some(&token), serde_json::json!({}))).await,
        StatusCode::CREATED,
    )
    .await;

    let content = b"hello depot".to_vec();
    let created = body_json(
        expect_status(
            send(&app, post_multipart("/api/files/docs/hello.txt", Some(&token), &content)).await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await;
    assert_eq!(created["size"], content.len());
    assert_eq!(created["is_dir"], false);

    let listing = body_json(send(&app, get("/api/files/docs", Some(&token))).await).await;
    assert_eq!(listing[0]["name"], "hello.txt");
    assert_eq!(listing[0]["path"], "docs/hello.txt");

    // exclusive create refuses to clobber
    expect_error(
        send(&app, post_multipart("/api/files/docs/hello.txt", Some(&token), &content)).await,
        StatusCode::CONFLICT,
    )
    .await;

    // download whole
    let response = expect_status(
        send(&app, get("/api/files/docs/hello.txt", Some(&token))).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body_bytes(response).await, content);

    // ranged download
    let mut request = get("/api/files/docs/hello.txt", Some(&token));
    request
        .headers_mut()
        .insert(header::RANGE, "bytes=0-4".parse().unwrap());
    let response = expect_status(send(&app, request).await, StatusCode::PARTIAL_CONTENT).await;
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap(),
        format!("bytes 0-4/{}", content.len())
    );
    assert_eq!(body_bytes(response).await, b"hello".to_vec());

    // rename then delete
    expect_status(
        send(
            &app,
            put_json(
                "/api/files/docs/hello.txt",
                Some(&token),
                serde_json::json!({"new_path": "docs/renamed.txt"}),
            ),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    expect_status(
        send(&app, delete("/api/files/docs/renamed.txt", Some(&token))).await,
        StatusCode::NO_CONTENT,
    )
    .await;
    expect_error(
        send(&app, get("/api/files/docs/renamed.txt", Some(&token))).await,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn traversal_attempts_are_bad_requests() {
    let world = TestWorld::new().await;
    let (_admin, token) = world.admin().await;
    let app = world.router();

    expect_error(
        send(&app, get("/api/files?path=../../etc/passwd", Some(&token))).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    expect_error(
        send(&app, get("/api/files?path=..", Some(&token))).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

/// End-to-end permission scenario: pool + zone, a grant for staff, one user
/// in the group and one outside it.
#[tokio::test]
async fn zone_permissions_govern_access() {
    let world = TestWorld::new().await;
    let (_admin, admin_token) = world.admin().await;

    // pool root on disk
    let pool_root = world.data_dir.path().join("pool");
    tokio::fs::create_dir_all(pool_root.join("team")).await.unwrap();
    tokio::fs::write(pool_root.join("team/report.pdf"), b"pdf bytes").await.unwrap();
    let pool_root = pool_root.canonicalize().unwrap();

    let app = world.router();

    let pool = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    "/api/storage/pools",
                    Some(&admin_token),
                    serde_json::json!({"name": "main", "path": pool_root.to_str().unwrap()}),
                ),
            )
            .await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await;

    let zone = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    "/api/storage/zones",
                    Some(&admin_token),
                    serde_json::json!({
                        "name": "team",
                        "pool_id": pool["id"],
                        "path": "team",
                        "zone_type": "group"
                    }),
                ),
            )
            .await,
            StatusCode::CREATED,
        )
        .await,
    )
    .await;
    let zone_name = zone["name"].as_str().unwrap();

    // grant read on the zone root to group staff
    let zone_root = pool_root.join("team");
    expect_status(
        send(
            &app,
            post_json(
                "/api/permissions",
                Some(&admin_token),
                serde_json::json!({
                    "path": zone_root.to_str().unwrap(),
                    "type": "read",
                    "group": "staff"
                }),
            ),
        )
        .await,
        StatusCode::CREATED,
    )
    .await;

    let alice = world.create_user("alice", "alice-password", false, &["staff"]).await;
    let alice_token = world.token_for(&alice).await;
    let bob = world.create_user("bob", "bob-password-9", false, &[]).await;
    let bob_token = world.token_for(&bob).await;

    // alice can list and download
    let listing = body_json(
        expect_status(
            send(&app, get(&format!("/api/zones/{zone_name}/files"), Some(&alice_token))).await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(listing[0]["name"], "report.pdf");

    let response = expect_status(
        send(
            &app,
            get(&format!("/api/zones/{zone_name}/files/report.pdf"), Some(&alice_token)),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body_bytes(response).await, b"pdf bytes".to_vec());

    // alice cannot write (read only granted)
    expect_error(
        send(
            &app,
            post_multipart(
                &format!("/api/zones/{zone_name}/files/new.txt"),
                Some(&alice_token),
                b"nope",
            ),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // bob has no grant at all
    expect_error(
        send(
            &app,
            get(&format!("/api/zones/{zone_name}/files/report.pdf"), Some(&bob_token)),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    // accessible zones reflect the same split
    let accessible = body_json(
        send(&app, get("/api/zones/accessible", Some(&alice_token))).await,
    )
    .await;
    assert_eq!(accessible.as_array().unwrap().len(), 1);
}

/// read_only is an operational flag on the zone itself: it rejects writes
/// even for admins and even when permission rows would allow them.
#[tokio::test]
async fn read_only_zone_rejects_writes() {
    let world = TestWorld::new().await;
    let (_admin, admin_token) = world.admin().await;

    let pool_root = world.data_dir.path().join("ro-pool");
    tokio::fs::create_dir_all(pool_root.join("frozen")).await.unwrap();
    tokio::fs::write(pool_root.join("frozen/existing.txt"), b"keep me").await.unwrap();
    let pool_root = pool_root.canonicalize().unwrap();

    let app = world.router();

    let pool = body_json(
        send(
            &app,
            post_json(
                "/api/storage/pools",
                Some(&admin_token),
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
                Some(&admin_token),
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

    // reads still work
    let listing = body_json(
        expect_status(
            send(&app, get("/api/zones/frozen/files", Some(&admin_token))).await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(listing[0]["name"], "existing.txt");

    // every mutating path is rejected
    expect_error(
        send(
            &app,
            post_multipart("/api/zones/frozen/files/new.txt", Some(&admin_token), b"no"),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;
    expect_error(
        send(
            &app,
            post_json("/api/zones/frozen/folders/sub", Some(&admin_token), serde_json::json!({})),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;
    expect_error(
        send(&app, delete("/api/zones/frozen/files/existing.txt", Some(&admin_token))).await,
        StatusCode::FORBIDDEN,
    )
    .await;
    expect_error(
        send(
            &app,
            post_json(
                "/api/zones/frozen/bulk/delete",
                Some(&admin_token),
                serde_json::json!({"paths": ["existing.txt"]}),
            ),
        )
        .await,
        StatusCode::FORBIDDEN,
    )
    .await;

    assert!(pool_root.join("frozen/existing.txt").exists());
}

#[tokio::test]
async fn zone_write_grant_allows_upload_and_bulk_ops() {
    let world = TestWorld::new().await;
    let (_admin, admin_token) = world.admin().await;

    let pool_root = world.data_dir.path().join("pool2");
    tokio::fs::create_dir_all(pool_root.join("drop")).await.unwrap();
    let pool_root = pool_root.canonicalize().unwrap();

    let app = world.router();

    let pool = body_json(
        send(
            &app,
            post_json(
                "/api/storage/pools",
                Some(&admin_token),
                serde_json::json!({"name": "p2", "path": pool_root.to_str().unwrap()}),
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
                Some(&admin_token),
                serde_json::json!({
                    "name": "drop", "pool_id": pool["id"], "path": "drop", "zone_type": "public"
                }),
            ),
        )
        .await,
    )
    .await;

    let zone_root = pool_root.join("drop");
    for perm in ["read", "write", "delete"] {
        expect_status(
            send(
                &app,
                post_json(
                    "/api/permissions",
                    Some(&admin_token),
                    serde_json::json!({
                        "path": zone_root.to_str().unwrap(),
                        "type": perm,
                        "username": "dave"
                    }),
                ),
            )
            .await,
            StatusCode::CREATED,
        )
        .await;
    }

    let dave = world.create_user("dave", "dave-password", false, &[]).await;
    let dave_token = world.token_for(&dave).await;

    // upload, mkdir, bulk move, bulk delete
    expect_status(
        send(&app, post_multipart("/api/zones/drop/files/a.txt", Some(&dave_token), b"A")).await,
        StatusCode::CREATED,
    )
    .await;
    expect_status(
        send(&app, post_json("/api/zones/drop/folders/archive", Some(&dave_token), serde_json::json!({}))).await,
        StatusCode::CREATED,
    )
    .await;

    let moved = body_json(
        expect_status(
            send(
                &app,
                post_json(
                    "/api/zones/drop/bulk/move",
                    Some(&dave_token),
                    serde_json::json!({"paths": ["a.txt"], "destination": "archive"}),
                ),
            )
            .await,
            StatusCode::OK,
        )
        .await,
    )
    .await;
    assert_eq!(moved["results"][0]["ok"], true);
    assert!(zone_root.join("archive/a.txt").exists());

    let deleted = body_json(
        send(
            &app,
            post_json(
                "/api/zones/drop/bulk/delete",
                Some(&dave_token),
                serde_json::json!({"paths": ["archive/a.txt", "missing.txt"]}),
            ),
        )
        .await,
    )
    .await;
    let results = deleted["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let ok_count = results.iter().filter(|r| r["ok"] == true).count();
    assert_eq!(ok_count, 1);
}
