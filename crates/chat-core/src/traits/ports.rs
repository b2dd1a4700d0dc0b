//! Collaborator traits (ports) - the backend and device services the client
//! depends on
//!
//! The presence cache and the message relay only see these traits. HTTP,
//! storage and notification implementations live in outer crates and tests
//! substitute in-memory fakes.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::entities::{Message, PresenceEntry};
use crate::error::DomainError;
use crate::value_objects::{ChannelId, UserId};

/// Result type for collaborator operations
pub type PortResult<T> = Result<T, DomainError>;

// ============================================================================
// Messages
// ============================================================================

/// Query parameters for message fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    /// Only messages strictly older than this timestamp (epoch ms)
    pub before: Option<i64>,
    /// Maximum number of messages, newest first on the wire
    pub limit: u32,
}

impl MessageQuery {
    /// Most recent `limit` messages
    #[must_use]
    pub fn latest(limit: u32) -> Self {
        Self {
            before: None,
            limit,
        }
    }

    /// Page of messages older than `before`
    #[must_use]
    pub fn before(before: i64, limit: u32) -> Self {
        Self {
            before: Some(before),
            limit,
        }
    }
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self::latest(20)
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch messages of a channel
    async fn fetch_channel_messages(
        &self,
        channel_id: &ChannelId,
        query: MessageQuery,
    ) -> PortResult<Vec<Message>>;

    /// Fetch messages of the direct conversation between two users
    async fn fetch_direct_messages(
        &self,
        user_id: &UserId,
        target_user_id: &UserId,
        query: MessageQuery,
    ) -> PortResult<Vec<Message>>;

    /// Lightweight existence check. Returns `DomainError::ChannelNotFound`
    /// when the channel is gone.
    async fn check_channel(&self, channel_id: &ChannelId) -> PortResult<()>;
}

/// Remembers channels known to be deleted so later listeners can short-circuit
pub trait DeletionRegistry: Send + Sync {
    fn is_deleted(&self, channel_id: &ChannelId) -> bool;

    fn mark_deleted(&self, channel_id: &ChannelId);
}

/// Local alert for inbound direct messages
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &Message);
}

// ============================================================================
// Presence
// ============================================================================

/// Source of real presence signals for a user's contacts
#[async_trait]
pub trait PresenceSource: Send + Sync {
    /// Contacts of `user_id` whose presence should be tracked
    async fn friends(&self, user_id: &UserId) -> PortResult<Vec<UserId>>;

    /// Latest reported presence for `user_ids`. Users the backend has no
    /// report for are simply absent from the map.
    async fn statuses(&self, user_ids: &[UserId]) -> PortResult<HashMap<UserId, PresenceEntry>>;
}

/// Local key-value store for small JSON snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, key: &str) -> PortResult<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> PortResult<()>;
}
