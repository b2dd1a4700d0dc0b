//! Message entity - a chat message as delivered by the backend

use serde::{Deserialize, Serialize};

use crate::value_objects::{ChannelId, MessageId, UserId};

/// Message entity
///
/// `timestamp` is epoch milliseconds and is the only ordering key the client
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    #[serde(default)]
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,
}

impl Message {
    /// Create a new Message
    pub fn new(
        id: impl Into<MessageId>,
        sender_id: impl Into<UserId>,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp,
            channel_id: None,
        }
    }

    /// Attach the channel this message belongs to
    #[must_use]
    pub fn in_channel(mut self, channel_id: impl Into<ChannelId>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Check if `user_id` wrote this message
    #[inline]
    pub fn is_from(&self, user_id: &UserId) -> bool {
        &self.sender_id == user_id
    }

    /// Get a truncated preview of the message (for notifications)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}
