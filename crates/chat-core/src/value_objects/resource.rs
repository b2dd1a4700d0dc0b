//! Watched resource identity
//!
//! A polling loop is keyed by the resource it watches. At most one loop may
//! exist per key.

use std::fmt;

use super::ids::{ChannelId, UserId};

/// Identity of a channel or direct conversation being watched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// Group channel
    Channel(ChannelId),
    /// Direct conversation as seen by `user_id`
    Direct {
        user_id: UserId,
        target_user_id: UserId,
    },
}

impl ResourceKey {
    /// Key for a channel
    pub fn channel(channel_id: impl Into<ChannelId>) -> Self {
        Self::Channel(channel_id.into())
    }

    /// Key for a direct conversation
    pub fn direct(user_id: impl Into<UserId>, target_user_id: impl Into<UserId>) -> Self {
        Self::Direct {
            user_id: user_id.into(),
            target_user_id: target_user_id.into(),
        }
    }

    /// Channel id, if this key refers to a channel
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Self::Channel(id) => Some(id),
            Self::Direct { .. } => None,
        }
    }

    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Channel(_) => "channel",
            Self::Direct { .. } => "direct",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::Direct {
                user_id,
                target_user_id,
            } => write!(f, "direct:{user_id}:{target_user_id}"),
        }
    }
}
