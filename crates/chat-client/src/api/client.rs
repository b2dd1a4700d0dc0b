//! HTTP implementation of the backend ports

use async_trait::async_trait;
use chat_common::ApiConfig;
use chat_core::{
    ChannelId, DomainError, Message, MessageQuery, MessageSource, PortResult, PresenceEntry,
    PresenceSource, UserId,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, instrument};

use super::dto::FriendDto;

/// Header identifying the signed-in user on every request
pub const USER_HEADER: &str = "x-user-id";

/// REST client for the chat backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    user_id: UserId,
}

impl ApiClient {
    /// Create a client acting as `user_id`
    pub fn new(config: &ApiConfig, user_id: UserId) -> PortResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            DomainError::ValidationError(format!("invalid base url {}: {e}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(DomainError::ValidationError(format!(
                "base url {} cannot carry a path",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DomainError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base,
            user_id,
        })
    }

    /// User the client acts as
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Build an endpoint URL from path segments (each segment is escaped)
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url`. `not_found` maps a 404 to the matching domain error.
    async fn send<F>(&self, url: Url, query: &[(&str, String)], not_found: F) -> PortResult<Response>
    where
        F: FnOnce() -> DomainError,
    {
        let response = self
            .http
            .get(url)
            .header(USER_HEADER, self.user_id.as_str())
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(status, not_found))
        }
    }

    async fn get_json<T, F>(&self, url: Url, query: &[(&str, String)], not_found: F) -> PortResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> DomainError,
    {
        let response = self.send(url, query, not_found).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                DomainError::Decode(e.to_string())
            } else {
                transport_error(e)
            }
        })
    }

    async fn get_messages<F>(
        &self,
        url: Url,
        query: MessageQuery,
        not_found: F,
    ) -> PortResult<Vec<Message>>
    where
        F: FnOnce() -> DomainError,
    {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = query.before {
            params.push(("before", before.to_string()));
        }
        self.get_json(url, &params, not_found).await
    }
}

fn transport_error(error: reqwest::Error) -> DomainError {
    DomainError::Transport(error.to_string())
}

fn status_error<F>(status: StatusCode, not_found: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if status == StatusCode::NOT_FOUND {
        not_found()
    } else {
        DomainError::UnexpectedStatus(status.as_u16())
    }
}

#[async_trait]
impl MessageSource for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_channel_messages(
        &self,
        channel_id: &ChannelId,
        query: MessageQuery,
    ) -> PortResult<Vec<Message>> {
        let url = self.endpoint(&["channels", channel_id.as_str(), "messages"]);
        let messages = self
            .get_messages(url, query, || DomainError::ChannelNotFound(channel_id.clone()))
            .await?;
        debug!(count = messages.len(), "Fetched channel messages");
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn fetch_direct_messages(
        &self,
        user_id: &UserId,
        target_user_id: &UserId,
        query: MessageQuery,
    ) -> PortResult<Vec<Message>> {
        let url = self.endpoint(&[
            "direct-messages",
            user_id.as_str(),
            target_user_id.as_str(),
        ]);
        let messages = self
            .get_messages(url, query, || DomainError::UserNotFound(target_user_id.clone()))
            .await?;
        debug!(count = messages.len(), "Fetched direct messages");
        Ok(messages)
    }

    async fn check_channel(&self, channel_id: &ChannelId) -> PortResult<()> {
        let url = self.endpoint(&["channels", channel_id.as_str()]);
        self.send(url, &[], || DomainError::ChannelNotFound(channel_id.clone()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PresenceSource for ApiClient {
    async fn friends(&self, user_id: &UserId) -> PortResult<Vec<UserId>> {
        let url = self.endpoint(&["users", user_id.as_str(), "friends"]);
        let friends: Vec<FriendDto> = self
            .get_json(url, &[], || DomainError::UserNotFound(user_id.clone()))
            .await?;
        Ok(friends.into_iter().map(|friend| friend.id).collect())
    }

    async fn statuses(&self, user_ids: &[UserId]) -> PortResult<HashMap<UserId, PresenceEntry>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = user_ids
            .iter()
            .map(UserId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = self.endpoint(&["presence"]);
        self.get_json(url, &[("ids", ids)], || DomainError::UnexpectedStatus(404))
            .await
    }
}
