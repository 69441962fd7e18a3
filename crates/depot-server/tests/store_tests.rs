//! Metadata store contract tests over an in-memory database.

mod common;

use chrono::{Duration, Utc};
use common::TestWorld;
use depot_server::db::{self, DbError};
use depot_server::models::{PermType, TargetType, ZoneType};

#[tokio::test]
async fn user_round_trip_and_cascade() {
    let world = TestWorld::new().await;
    let user = world.create_user("carol", "pw-carol-1", false, &["staff"]).await;

    let fetched = db::users::get_by_username(&world.db, "carol").await.unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.groups.0, vec!["staff".to_string()]);

    // update reflects
    let updated = db::users::update(
        &world.db,
        user.id,
        db::users::UserPatch {
            email: Some("carol@nas.local".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.email, "carol@nas.local");

    // session cascade on delete
    let token = world.token_for(&user).await;
    assert!(db::sessions::get(&world.db, &token).await.unwrap().is_some());

    db::users::delete(&world.db, user.id).await.unwrap();
    assert!(matches!(
        db::users::get(&world.db, user.id).await,
        Err(DbError::NotFound(_))
    ));
    assert!(db::sessions::get(&world.db, &token).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let world = TestWorld::new().await;
    world.create_user("dup", "pw-dup-111", false, &[]).await;

    let result = db::users::create(
        &world.db,
        db::users::NewUser {
            username: "dup".into(),
            password_hash: String::new(),
            email: String::new(),
            is_admin: false,
            groups: vec![],
            must_change_password: false,
        },
    )
    .await;

    assert!(matches!(result, Err(DbError::Duplicate(_))));
}

#[tokio::test]
async fn expired_session_sweep_is_idempotent() {
    let world = TestWorld::new().await;
    let user = world.create_user("sweep", "pw-sweep-1", false, &[]).await;

    db::sessions::insert(&world.db, "old-token", user.id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    db::sessions::insert(&world.db, "live-token", user.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(db::sessions::clean_expired(&world.db, Utc::now()).await.unwrap(), 1);
    assert_eq!(db::sessions::clean_expired(&world.db, Utc::now()).await.unwrap(), 0);
    assert!(db::sessions::get(&world.db, "live-token").await.unwrap().is_some());
}

#[tokio::test]
async fn pool_delete_blocked_while_zone_exists() {
    let world = TestWorld::new().await;

    let pool = db::pools::create(
        &world.db,
        db::pools::NewPool {
            name: "tank".into(),
            path: "/srv/tank".into(),
            reserved_bytes: 0,
            max_file_size: 0,
            allowed_extensions: vec![],
            denied_extensions: vec![],
            default_user_quota: 0,
            default_group_quota: 0,
        },
    )
    .await
    .unwrap();

    let zone = db::zones::create(
        &world.db,
        db::zones::NewZone {
            name: "team".into(),
            pool_id: pool.id,
            path: "team".into(),
            zone_type: ZoneType::Group,
            allowed_users: vec![],
            allowed_groups: vec![],
            denied_users: vec![],
            denied_groups: vec![],
            read_only: false,
            browsable: true,
        },
    )
    .await
    .unwrap();

    assert!(matches!(
        db::pools::delete(&world.db, pool.id).await,
        Err(DbError::InUse(_))
    ));

    // zone first, then pool
    db::zones::delete(&world.db, zone.id).await.unwrap();
    db::pools::delete(&world.db, pool.id).await.unwrap();
}

#[tokio::test]
async fn share_link_download_counter_stops_at_cap() {
    let world = TestWorld::new().await;
    let owner = world.create_user("owner", "pw-owner-1", false, &[]).await;

    let link = db::share_links::create(
        &world.db,
        db::share_links::NewShareLink {
            token: "cap-token".into(),
            owner_id: owner.id,
            target_path: "/srv/tank/report.pdf".into(),
            target_type: TargetType::File,
            target_name: "report.pdf".into(),
            password_hash: None,
            expires_at: None,
            max_downloads: 2,
            max_views: 0,
            allow_download: true,
            allow_preview: true,
            allow_upload: false,
            allow_listing: false,
            show_owner: false,
        },
    )
    .await
    .unwrap();

    assert!(db::share_links::increment_download(&world.db, link.id).await.unwrap());
    assert!(db::share_links::increment_download(&world.db, link.id).await.unwrap());
    // third claim loses
    assert!(!db::share_links::increment_download(&world.db, link.id).await.unwrap());

    let stored = db::share_links::get(&world.db, link.id).await.unwrap();
    assert_eq!(stored.download_count, 2);
    assert!(stored.last_accessed.is_some());

    // unlimited views keep counting
    for _ in 0..5 {
        assert!(db::share_links::increment_view(&world.db, link.id).await.unwrap());
    }
}

#[tokio::test]
async fn expired_share_links_are_swept() {
    let world = TestWorld::new().await;
    let owner = world.create_user("sweep2", "pw-sweep-2", false, &[]).await;

    for (token, offset_hours) in [("past-link", -1i64), ("future-link", 1)] {
        db::share_links::create(
            &world.db,
            db::share_links::NewShareLink {
                token: token.into(),
                owner_id: owner.id,
                target_path: "/srv/x".into(),
                target_type: TargetType::File,
                target_name: "x".into(),
                password_hash: None,
                expires_at: Some(Utc::now() + Duration::hours(offset_hours)),
                max_downloads: 0,
                max_views: 0,
                allow_download: true,
                allow_preview: true,
                allow_upload: false,
                allow_listing: false,
                show_owner: false,
            },
        )
        .await
        .unwrap();
    }

    assert_eq!(db::share_links::clean_expired(&world.db, Utc::now()).await.unwrap(), 1);
    assert!(db::share_links::get_by_token(&world.db, "future-link").await.is_ok());
    assert!(db::share_links::get_by_token(&world.db, "past-link").await.is_err());
}

#[tokio::test]
async fn permission_rows_constrain_subject() {
    let world = TestWorld::new().await;

    let granted = db::permissions::grant(
        &world.db,
        db::permissions::NewPermission {
            path: "/srv/tank/team".into(),
            perm_type: PermType::Read,
            username: String::new(),
            group_name: "staff".into(),
        },
    )
    .await
    .unwrap();

    let rows = db::permissions::list_for_subject(&world.db, "alice", &["staff".into()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, granted.id);

    let rows = db::permissions::list_for_subject(&world.db, "alice", &["other".into()])
        .await
        .unwrap();
    assert!(rows.is_empty());

    db::permissions::revoke(&world.db, granted.id).await.unwrap();
    assert!(matches!(
        db::permissions::revoke(&world.db, granted.id).await,
        Err(DbError::NotFound(_))
    ));
}
