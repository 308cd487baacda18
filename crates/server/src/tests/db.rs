use std::net::IpAddr;

use base64::prelude::BASE64_STANDARD as BASE64;
use base64::Engine;
use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::auth::utils::unpack_session_id_and_token;
use crate::config::AuthConfig;
use crate::database::connection::{DbConfig, DbConnection};
use crate::error::RequestError;
use crate::models::page::{CreatePageRequest, PageType, PageUpdate};
use crate::models::resource::{
    CreateResourceRequest, ReorderBatch, ResourceId, ResourceType, ResourceUpdate,
};
use crate::models::user::UserId;

/// Some tests can't run in parallel, prevent them from breaking each other's state
static SERIAL_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

/// These tests need a local development database. Skip when it isn't
/// configured (CI environment).
fn test_db_disabled() -> bool {
    if std::env::var("MURO_TEST_DB").is_err() {
        eprintln!("Skipping test: set MURO_TEST_DB to run database tests");
        return true;
    }
    false
}

async fn init_and_get_db() -> DbConnection {
    let _ = tracing_subscriber::fmt::try_init();

    let config = DbConfig::development("muro_db", "muro_guest", "muropass");
    let db = DbConnection::connect(&config).await.unwrap();
    db.drop_schema().await.unwrap();
    db.init_schema().await.unwrap();
    db
}

fn local_ip() -> IpNetwork {
    IpNetwork::from("127.0.0.1".parse::<IpAddr>().unwrap())
}

async fn register_and_get_id(db: &DbConnection, email: &str) -> UserId {
    db.register_user(email, "changepassword").await.unwrap().id
}

fn song_page(name: &str) -> CreatePageRequest {
    CreatePageRequest {
        name: name.to_string(),
        page_type: PageType::Song,
        is_favorite: false,
    }
}

fn file_resource(page_id: i32, title: &str, path: &str) -> CreateResourceRequest {
    CreateResourceRequest {
        page_id,
        title: title.to_string(),
        description: None,
        resource_type: ResourceType::Video,
        file_path: Some(path.to_string()),
        external_url: None,
        is_expanded: true,
    }
}

fn link_resource(page_id: i32, title: &str, url: &str) -> CreateResourceRequest {
    CreateResourceRequest {
        page_id,
        title: title.to_string(),
        description: None,
        resource_type: ResourceType::Document,
        file_path: None,
        external_url: Some(url.to_string()),
        is_expanded: true,
    }
}

#[tokio::test]
async fn page_and_resource_lifecycle() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    let owner = register_and_get_id(&db, "mic@example.com").await;
    let page = db.create_page(owner, &song_page("Wonderwall")).await.unwrap();

    // appended ranks: first created gets 0, next gets 1
    let video = db
        .create_resource(owner, &file_resource(page.id, "Live take", "song/wonderwall/live.mp4"))
        .await
        .unwrap();
    let tabs = db
        .create_resource(owner, &link_resource(page.id, "Tabs", "https://example.com/tabs"))
        .await
        .unwrap();
    assert_eq!(video.display_order, 0);
    assert_eq!(tabs.display_order, 1);

    let listed = db.list_resources(owner, Some(page.id)).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, video.id);
    assert_eq!(listed[1].id, tabs.id);

    // swap via reorder batch
    let batch: ReorderBatch = [(video.id, 1), (tabs.id, 0)].into_iter().collect();
    let reordered = db.reorder_resources(owner, &batch).await.unwrap();
    assert_eq!(reordered[0].id, tabs.id);
    assert_eq!(reordered[0].display_order, 0);
    assert_eq!(reordered[1].id, video.id);
    assert_eq!(reordered[1].display_order, 1);

    let listed = db.list_resources(owner, Some(page.id)).await.unwrap();
    assert_eq!(listed[0].id, tabs.id);
    assert_eq!(listed[1].id, video.id);

    // partial updates leave the other fields alone
    let renamed = db
        .update_page(
            owner,
            page.id,
            &PageUpdate {
                name: Some("Wonderwall (acoustic)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Wonderwall (acoustic)");
    assert_eq!(renamed.page_type, PageType::Song);

    let collapsed = db
        .update_resource(
            owner,
            video.id,
            &ResourceUpdate {
                is_expanded: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!collapsed.is_expanded);
    assert_eq!(collapsed.title, "Live take");
}

#[tokio::test]
async fn reorder_rejects_invalid_batches() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    let owner = register_and_get_id(&db, "mic@example.com").await;
    let page = db.create_page(owner, &song_page("Creep")).await.unwrap();
    let mut ids: Vec<ResourceId> = Vec::new();
    for i in 0..3 {
        let resource = db
            .create_resource(
                owner,
                &link_resource(page.id, &format!("link {i}"), "https://example.com"),
            )
            .await
            .unwrap();
        ids.push(resource.id);
    }

    // missing one of the page's resources
    let partial: ReorderBatch = [(ids[0], 1), (ids[1], 0)].into_iter().collect();
    assert!(matches!(
        db.reorder_resources(owner, &partial).await,
        Err(RequestError::Validation(_))
    ));

    // order value outside 0..n
    let out_of_range: ReorderBatch = [(ids[0], 0), (ids[1], 1), (ids[2], 5)].into_iter().collect();
    assert!(matches!(
        db.reorder_resources(owner, &out_of_range).await,
        Err(RequestError::Validation(_))
    ));

    // unknown resource id
    let foreign: ReorderBatch = [(ids[0], 0), (ids[1], 1), (9999, 2)].into_iter().collect();
    assert!(matches!(
        db.reorder_resources(owner, &foreign).await,
        Err(RequestError::NotFound)
    ));

    // nothing was corrupted by the rejected batches
    let listed = db.list_resources(owner, Some(page.id)).await.unwrap();
    let orders: Vec<i32> = listed.iter().map(|r| r.display_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    let listed_ids: Vec<ResourceId> = listed.iter().map(|r| r.id).collect();
    assert_eq!(listed_ids, ids);
}

#[tokio::test]
async fn deleting_page_cascades_to_resources() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    let owner = register_and_get_id(&db, "mic@example.com").await;
    let page = db.create_page(owner, &song_page("Let It Be")).await.unwrap();
    let mut ids = Vec::new();
    for i in 0..3 {
        let resource = db
            .create_resource(
                owner,
                &file_resource(page.id, &format!("file {i}"), &format!("song/let_it_be/f{i}.mp4")),
            )
            .await
            .unwrap();
        ids.push(resource.id);
    }

    let orphaned = db.delete_page(owner, page.id).await.unwrap();
    assert_eq!(orphaned.len(), 3);

    for id in ids {
        assert!(matches!(
            db.get_resource(owner, id).await,
            Err(RequestError::NotFound)
        ));
    }
    assert!(matches!(
        db.get_page_with_resources(owner, page.id).await,
        Err(RequestError::NotFound)
    ));
}

#[tokio::test]
async fn deleting_middle_resource_recompacts_ranks() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    let owner = register_and_get_id(&db, "mic@example.com").await;
    let page = db.create_page(owner, &song_page("Yesterday")).await.unwrap();
    let mut ids = Vec::new();
    for i in 0..3 {
        let resource = db
            .create_resource(
                owner,
                &link_resource(page.id, &format!("link {i}"), "https://example.com"),
            )
            .await
            .unwrap();
        ids.push(resource.id);
    }

    db.delete_resource(owner, ids[1]).await.unwrap();

    let listed = db.list_resources(owner, Some(page.id)).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, ids[0]);
    assert_eq!(listed[0].display_order, 0);
    assert_eq!(listed[1].id, ids[2]);
    assert_eq!(listed[1].display_order, 1);
}

#[tokio::test]
async fn foreign_pages_and_resources_are_invisible() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    let owner = register_and_get_id(&db, "mic@example.com").await;
    let stranger = register_and_get_id(&db, "other@example.com").await;
    let page = db.create_page(owner, &song_page("Imagine")).await.unwrap();
    let resource = db
        .create_resource(owner, &link_resource(page.id, "Link", "https://example.com"))
        .await
        .unwrap();

    assert!(matches!(
        db.get_page_with_resources(stranger, page.id).await,
        Err(RequestError::NotFound)
    ));
    assert!(matches!(
        db.get_resource(stranger, resource.id).await,
        Err(RequestError::NotFound)
    ));
    assert!(matches!(
        db.update_page(
            stranger,
            page.id,
            &PageUpdate {
                is_favorite: Some(true),
                ..Default::default()
            },
        )
        .await,
        Err(RequestError::NotFound)
    ));
    assert!(matches!(
        db.delete_page(stranger, page.id).await,
        Err(RequestError::NotFound)
    ));
    let batch: ReorderBatch = [(resource.id, 0)].into_iter().collect();
    assert!(matches!(
        db.reorder_resources(stranger, &batch).await,
        Err(RequestError::NotFound)
    ));

    // the stranger's listing is empty, not an error
    assert!(db.list_pages_with_resources(stranger).await.unwrap().is_empty());

    // and the owner still sees everything intact
    let pages = db.list_pages_with_resources(owner).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].resources.len(), 1);
}

#[tokio::test]
async fn session_login_refresh_logout_flow() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;
    let auth = AuthConfig::default();

    let owner = register_and_get_id(&db, "mic@example.com").await;
    assert!(matches!(
        db.login("mic@example.com", "wrongpassword", local_ip(), &auth)
            .await,
        Err(RequestError::BadCredentials)
    ));

    let exchange = db
        .login("mic@example.com", "changepassword", local_ip(), &auth)
        .await
        .unwrap();

    let packed = BASE64.decode(&exchange.access_token).unwrap();
    let (sid, access_token) = unpack_session_id_and_token(&packed).unwrap();
    assert_eq!(db.resolve_session(&sid, access_token).await.unwrap(), owner);

    // refresh rotates both tokens, the old access token dies with them
    let packed_refresh = BASE64.decode(&exchange.refresh_token).unwrap();
    let (sid, refresh_token) = unpack_session_id_and_token(&packed_refresh).unwrap();
    let rotated = db.refresh_session(&sid, refresh_token, &auth).await.unwrap();
    assert!(db.resolve_session(&sid, access_token).await.is_err());

    let packed = BASE64.decode(&rotated.access_token).unwrap();
    let (sid, new_access) = unpack_session_id_and_token(&packed).unwrap();
    assert_eq!(db.resolve_session(&sid, new_access).await.unwrap(), owner);

    db.logout(&sid).await.unwrap();
    assert!(db.resolve_session(&sid, new_access).await.is_err());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    if test_db_disabled() {
        return;
    }
    let _lock = SERIAL_LOCK.lock().await;
    let db = init_and_get_db().await;

    register_and_get_id(&db, "mic@example.com").await;
    assert!(matches!(
        db.register_user("mic@example.com", "changepassword").await,
        Err(RequestError::Validation(_))
    ));
}
