//! Transport-agnostic message feeds.
//!
//! A feed turns "tell me about new messages in X" into a `Subscription`.
//! Callers only depend on this module, so a push transport can replace
//! polling without touching them.

mod subscription;

use chat_core::{ChannelId, Message, UserId};
use std::sync::Arc;

pub use subscription::{FeedStatus, StopReason, Subscription};

/// Callback invoked once per new message, in timestamp order
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Capability to watch conversations for new messages
pub trait MessageFeed: Send + Sync {
    /// Watch a channel
    fn watch_channel(&self, channel_id: ChannelId, on_message: MessageCallback) -> Subscription;

    /// Watch the direct conversation between `user_id` and `target_user_id`
    fn watch_direct(
        &self,
        user_id: UserId,
        target_user_id: UserId,
        on_message: MessageCallback,
    ) -> Subscription;
}
