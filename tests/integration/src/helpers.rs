//! Test helpers for integration tests
//!
//! Provides an in-process fake of the chat backend REST API and utilities
//! for waiting on asynchronous effects.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chat_client::{ApiClient, USER_HEADER};
use chat_common::ApiConfig;
use chat_core::{Message, PresenceEntry, UserId};
use parking_lot::RwLock;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Mutable state behind the fake backend
#[derive(Default)]
pub struct BackendState {
    channels: RwLock<HashMap<String, Vec<Message>>>,
    directs: RwLock<HashMap<(String, String), Vec<Message>>>,
    friends: RwLock<HashMap<String, Vec<String>>>,
    presence: RwLock<HashMap<String, PresenceEntry>>,
    /// Every route answers 500 while set
    outage: AtomicBool,
    /// Message routes answer 200 with a non-JSON body while set
    malformed: AtomicBool,
    requests: AtomicUsize,
    last_user: RwLock<Option<String>>,
    last_query: RwLock<HashMap<String, String>>,
}

impl BackendState {
    /// Create an (empty) channel
    pub fn create_channel(&self, channel_id: &str) {
        self.channels
            .write()
            .entry(channel_id.to_string())
            .or_default();
    }

    /// Remove a channel and its messages
    pub fn delete_channel(&self, channel_id: &str) {
        self.channels.write().remove(channel_id);
    }

    /// Post a message to a channel, creating it if needed
    pub fn post(&self, channel_id: &str, message: Message) {
        self.channels
            .write()
            .entry(channel_id.to_string())
            .or_default()
            .push(message.in_channel(channel_id));
    }

    /// Post a direct message, visible from both sides of the conversation
    pub fn post_direct(&self, a: &str, b: &str, message: Message) {
        self.directs
            .write()
            .entry(conversation(a, b))
            .or_default()
            .push(message);
    }

    pub fn set_friends(&self, user_id: &str, friends: &[&str]) {
        self.friends.write().insert(
            user_id.to_string(),
            friends.iter().map(ToString::to_string).collect(),
        );
    }

    pub fn set_presence(&self, user_id: &str, entry: PresenceEntry) {
        self.presence.write().insert(user_id.to_string(), entry);
    }

    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    pub fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    /// Number of requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// `x-user-id` of the latest request
    pub fn last_user(&self) -> Option<String> {
        self.last_user.read().clone()
    }

    /// Query parameters of the latest request
    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.read().clone()
    }

    /// Record the request; `Some` short-circuits with an error response
    fn observe(&self, headers: &HeaderMap, query: &HashMap<String, String>) -> Option<Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_query.write() = query.clone();

        let user = headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        *self.last_user.write() = user.clone();

        if user.is_none() {
            return Some(StatusCode::UNAUTHORIZED.into_response());
        }
        if self.outage.load(Ordering::SeqCst) {
            return Some(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
        None
    }

    fn page(&self, messages: &[Message], query: &PageQuery) -> Response {
        if self.malformed.load(Ordering::SeqCst) {
            return (StatusCode::OK, "<html>maintenance</html>").into_response();
        }

        let mut page: Vec<Message> = messages
            .iter()
            .filter(|m| query.before.map_or(true, |before| m.timestamp < before))
            .cloned()
            .collect();
        // Newest first, like the real API
        page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.truncate(query.limit.unwrap_or(20));
        Json(page).into_response()
    }
}

fn conversation(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug)]
struct PageQuery {
    limit: Option<usize>,
    before: Option<i64>,
}

impl PageQuery {
    fn from_map(query: &HashMap<String, String>) -> Self {
        Self {
            limit: query.get("limit").and_then(|v| v.parse().ok()),
            before: query.get("before").and_then(|v| v.parse().ok()),
        }
    }
}

type SharedState = Arc<BackendState>;

async fn get_channel(
    State(state): State<SharedState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe(&headers, &query) {
        return rejection;
    }
    if state.channels.read().contains_key(&channel_id) {
        Json(json!({ "id": channel_id })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn get_channel_messages(
    State(state): State<SharedState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe(&headers, &query) {
        return rejection;
    }
    let channels = state.channels.read();
    match channels.get(&channel_id) {
        Some(messages) => state.page(messages, &PageQuery::from_map(&query)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_direct_messages(
    State(state): State<SharedState>,
    Path((user_id, target_user_id)): Path<(String, String)>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe(&headers, &query) {
        return rejection;
    }
    let directs = state.directs.read();
    let messages = directs
        .get(&conversation(&user_id, &target_user_id))
        .cloned()
        .unwrap_or_default();
    state.page(&messages, &PageQuery::from_map(&query))
}

async fn get_friends(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe(&headers, &query) {
        return rejection;
    }
    let friends = state.friends.read().get(&user_id).cloned();
    match friends {
        Some(friends) => {
            let body: Vec<_> = friends.iter().map(|id| json!({ "id": id })).collect();
            Json(body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_presence(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = state.observe(&headers, &query) {
        return rejection;
    }
    let presence = state.presence.read();
    let body: HashMap<&str, PresenceEntry> = query
        .get("ids")
        .map(|ids| ids.split(',').collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| presence.get(id).map(|entry| (id, *entry)))
        .collect();
    Json(body).into_response()
}

/// Build the fake backend router
pub fn backend_router(state: SharedState) -> Router {
    Router::new()
        .route("/channels/:channel_id", get(get_channel))
        .route("/channels/:channel_id/messages", get(get_channel_messages))
        .route(
            "/direct-messages/:user_id/:target_user_id",
            get(get_direct_messages),
        )
        .route("/users/:user_id/friends", get(get_friends))
        .route("/presence", get(get_presence))
        .with_state(state)
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: SharedState,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a fake backend on an ephemeral port
    pub async fn start() -> Result<Self> {
        let state = SharedState::default();
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let app = backend_router(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url(),
            timeout_secs: 5,
        }
    }

    /// API client acting as `user_id`
    pub fn client(&self, user_id: &str) -> Result<Arc<ApiClient>> {
        Ok(Arc::new(ApiClient::new(
            &self.api_config(),
            UserId::from(user_id),
        )?))
    }
}

/// Base URL nothing listens on
pub async fn unused_base_url() -> Result<String> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/"))
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Run `future` with a timeout, failing the test if it does not finish
pub async fn within<F, T>(timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {timeout:?}"))
}
