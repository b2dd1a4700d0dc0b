//! REST client tests against the fake backend
//!
//! Run with: cargo test -p integration-tests --test api_client_tests

use chat_client::ApiClient;
use chat_common::ApiConfig;
use chat_core::{
    ChannelId, DomainError, MessageQuery, MessageSource, PresenceEntry, PresenceSource,
    PresenceStatus, UserId,
};
use integration_tests::{message, unique_channel, unused_base_url, TestServer};

#[tokio::test]
async fn test_fetch_channel_messages_sends_user_and_limit() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    for ts in [100, 300, 200] {
        server.state.post(&channel, message("bob", "hi", ts));
    }

    let client = server.client("alice").unwrap();
    let messages = client
        .fetch_channel_messages(&ChannelId::from(channel.as_str()), MessageQuery::latest(2))
        .await
        .unwrap();

    let timestamps: Vec<i64> = messages.iter().map(|m| m.timestamp).collect();
    assert_eq!(timestamps, vec![300, 200]);
    assert_eq!(messages[0].channel_id, Some(ChannelId::from(channel.as_str())));

    assert_eq!(server.state.last_user().as_deref(), Some("alice"));
    let query = server.state.last_query();
    assert_eq!(query.get("limit").map(String::as_str), Some("2"));
    assert!(!query.contains_key("before"));
}

#[tokio::test]
async fn test_fetch_older_page() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    for ts in [100, 200, 300] {
        server.state.post(&channel, message("bob", "hi", ts));
    }

    let client = server.client("alice").unwrap();
    let messages = client
        .fetch_channel_messages(
            &ChannelId::from(channel.as_str()),
            MessageQuery::before(300, 20),
        )
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(
        server.state.last_query().get("before").map(String::as_str),
        Some("300")
    );
}

#[tokio::test]
async fn test_direct_messages_visible_from_both_sides() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.state.post_direct("alice", "bob", message("bob", "hey", 10));

    let alice = server.client("alice").unwrap();
    let bob = server.client("bob").unwrap();

    let from_alice = alice
        .fetch_direct_messages(&UserId::from("alice"), &UserId::from("bob"), MessageQuery::default())
        .await
        .unwrap();
    let from_bob = bob
        .fetch_direct_messages(&UserId::from("bob"), &UserId::from("alice"), MessageQuery::default())
        .await
        .unwrap();

    assert_eq!(from_alice, from_bob);
    assert_eq!(from_alice.len(), 1);
}

#[tokio::test]
async fn test_check_channel() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    server.state.create_channel(&channel);
    let client = server.client("alice").unwrap();

    client
        .check_channel(&ChannelId::from(channel.as_str()))
        .await
        .unwrap();

    server.state.delete_channel(&channel);
    let err = client
        .check_channel(&ChannelId::from(channel.as_str()))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ChannelNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    server.state.create_channel(&channel);
    server.state.set_outage(true);

    let client = server.client("alice").unwrap();
    let err = client
        .fetch_channel_messages(&ChannelId::from(channel.as_str()), MessageQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::UnexpectedStatus(500)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_maps_to_decode() {
    let server = TestServer::start().await.expect("Failed to start server");
    let channel = unique_channel();
    server.state.create_channel(&channel);
    server.state.set_malformed(true);

    let client = server.client("alice").unwrap();
    let err = client
        .fetch_channel_messages(&ChannelId::from(channel.as_str()), MessageQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_backend_maps_to_transport() {
    let base_url = unused_base_url().await.unwrap();
    let client = ApiClient::new(
        &ApiConfig {
            base_url,
            timeout_secs: 2,
        },
        UserId::from("alice"),
    )
    .unwrap();

    let err = client
        .check_channel(&ChannelId::from("general"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_friends_and_statuses() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.state.set_friends("alice", &["bob", "carol"]);
    server
        .state
        .set_presence("bob", PresenceEntry::new(PresenceStatus::Away, 1_000));

    let client = server.client("alice").unwrap();
    let friends = client.friends(&UserId::from("alice")).await.unwrap();
    assert_eq!(friends, vec![UserId::from("bob"), UserId::from("carol")]);

    let statuses = client.statuses(&friends).await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(
        statuses.get(&UserId::from("bob")),
        Some(&PresenceEntry::new(PresenceStatus::Away, 1_000))
    );
    assert_eq!(
        server.state.last_query().get("ids").map(String::as_str),
        Some("bob,carol")
    );

    let err = client.friends(&UserId::from("nobody")).await.unwrap_err();
    assert!(matches!(err, DomainError::UserNotFound(_)));
}

#[tokio::test]
async fn test_empty_status_query_skips_request() {
    let server = TestServer::start().await.expect("Failed to start server");
    let client = server.client("alice").unwrap();

    let statuses = client.statuses(&[]).await.unwrap();

    assert!(statuses.is_empty());
    assert_eq!(server.state.request_count(), 0);
}
