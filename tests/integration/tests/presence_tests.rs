//! Presence cache and full client wiring against the fake backend
//!
//! Run with: cargo test -p integration-tests --test presence_tests

use std::sync::Arc;
use std::time::Duration;

use chat_client::{ClientApp, WatchTargets};
use chat_core::{
    AppLifecycle, ChannelId, Message, PresenceEntry, PresenceSnapshot, PresenceStatus,
    SnapshotStore, UserId,
};
use chat_presence::{FileSnapshotStore, PresenceCache, PresenceConfig, SNAPSHOT_KEY};
use chat_relay::{InMemoryDeletionRegistry, MessageCallback, NoopNotifier};
use integration_tests::{
    client_config, message, now_millis, unique_channel, wait_until, within, TestServer,
};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

const WAIT: Duration = Duration::from_secs(10);

async fn read_snapshot(store: &FileSnapshotStore) -> PresenceSnapshot {
    let raw = store
        .load(SNAPSHOT_KEY)
        .await
        .unwrap()
        .expect("snapshot written");
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_refresh_tracks_friends_and_persists() {
    let server = TestServer::start().await.expect("Failed to start server");
    let now = now_millis();
    server.state.set_friends("alice", &["bob", "carol"]);
    server
        .state
        .set_presence("bob", PresenceEntry::new(PresenceStatus::Online, now));

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSnapshotStore::new(dir.path()));
    let cache = PresenceCache::new(
        PresenceConfig::default(),
        store.clone(),
        server.client("alice").unwrap(),
    );

    let (_lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let handle = cache.initialize(UserId::from("alice"), lifecycle_rx).await;
    assert!(!handle.is_inert());

    let outcome = cache.refresh_statuses(&UserId::from("alice")).await;
    assert_eq!(outcome.added, 2);

    assert_eq!(cache.get_user_status(&UserId::from("alice")), PresenceStatus::Online);
    assert_eq!(cache.get_user_status(&UserId::from("bob")), PresenceStatus::Online);
    assert_eq!(cache.get_user_status(&UserId::from("carol")), PresenceStatus::Offline);

    cache.flush().await;
    let persisted = read_snapshot(&store).await;
    assert_eq!(persisted, cache.snapshot());

    handle.cleanup();
}

#[tokio::test]
async fn test_restart_restores_snapshot() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.state.set_friends("alice", &[]);
    let dir = tempfile::tempdir().unwrap();
    let last_seen = now_millis() - 1_000;

    {
        let cache = PresenceCache::new(
            PresenceConfig::default(),
            Arc::new(FileSnapshotStore::new(dir.path())),
            server.client("alice").unwrap(),
        );
        cache.set_user_status(&UserId::from("dave"), PresenceStatus::Away);
        cache.flush().await;
    }

    let cache = PresenceCache::new(
        PresenceConfig::default(),
        Arc::new(FileSnapshotStore::new(dir.path())),
        server.client("alice").unwrap(),
    );
    let (_lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let handle = cache.initialize(UserId::from("alice"), lifecycle_rx).await;

    let dave = cache.get_entry(&UserId::from("dave")).expect("restored");
    assert_eq!(dave.status, PresenceStatus::Away);
    assert!(dave.last_seen >= last_seen);
    assert!(cache.is_online(&UserId::from("alice")));

    handle.cleanup();
}

#[tokio::test]
async fn test_backend_outage_keeps_cache_usable() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.state.set_outage(true);

    let cache = PresenceCache::new(
        PresenceConfig::default(),
        Arc::new(chat_presence::MemorySnapshotStore::new()),
        server.client("alice").unwrap(),
    );
    let (_lifecycle_tx, lifecycle_rx) = watch::channel(AppLifecycle::Active);
    let handle = cache.initialize(UserId::from("alice"), lifecycle_rx).await;

    let outcome = cache.refresh_statuses(&UserId::from("alice")).await;

    assert!(outcome.is_empty());
    assert!(cache.is_online(&UserId::from("alice")));
    handle.cleanup();
}

#[tokio::test]
async fn test_client_app_end_to_end() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    server.state.create_channel(&channel);
    server.state.set_friends("alice", &["bob"]);
    server
        .state
        .set_presence("bob", PresenceEntry::new(PresenceStatus::Online, now_millis()));

    let dir = tempfile::tempdir().unwrap();
    let config = client_config(&server.base_url(), "alice", dir.path()).unwrap();
    let store = Arc::new(FileSnapshotStore::new(dir.path()));
    let app = Arc::new(ClientApp::with_parts(
        &config,
        server.client("alice").unwrap(),
        store.clone(),
        Arc::new(InMemoryDeletionRegistry::new()),
        Arc::new(NoopNotifier),
    ));

    let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let on_message: MessageCallback = Arc::new(move |message: Message| sink.lock().push(message));

    let targets = WatchTargets {
        channel_id: Some(ChannelId::from(channel.as_str())),
        target_user_id: None,
    };
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let runner = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            app.run_until(&targets, on_message, async {
                stop_rx.await.ok();
            })
            .await
        })
    };

    assert!(wait_until(WAIT, || app.relay().active_count() == 1).await);
    assert!(app.presence().is_online(&UserId::from("bob")));

    server
        .state
        .post(&channel, message("bob", "hello alice", now_millis() + 1_000));
    assert!(wait_until(WAIT, || !received.lock().is_empty()).await);
    assert_eq!(received.lock()[0].content, "hello alice");

    app.set_lifecycle(AppLifecycle::Background);
    assert!(
        wait_until(WAIT, || {
            app.presence().get_user_status(&UserId::from("alice")) == PresenceStatus::Away
        })
        .await
    );

    stop_tx.send(()).unwrap();
    within(WAIT, runner).await.unwrap().unwrap().unwrap();

    assert_eq!(app.relay().active_count(), 0);
    assert!(!app.presence().is_running());

    let persisted = read_snapshot(&store).await;
    assert_eq!(
        persisted.get(&UserId::from("alice")).map(|e| e.status),
        Some(PresenceStatus::Offline)
    );
}
