//! # chat-relay
//!
//! Delivers new messages of a channel or direct conversation to a callback
//! through a subscribe/unsubscribe contract that does not depend on the
//! transport.
//!
//! ## Features
//!
//! - **Feeds**: `MessageFeed` capability returning a `Subscription` with an
//!   explicit status channel
//! - **Polling**: `PollingRelay`, a feed that polls the REST API on a fixed
//!   interval with watermark deduplication and error-driven shutdown
//! - **Collaborators**: in-memory deletion registry and notifiers
//!
//! ## Example
//!
//! ```ignore
//! use chat_relay::{MessageFeed, PollingRelay, RelayConfig};
//!
//! let relay = PollingRelay::new(RelayConfig::default(), api, deletions, notifier);
//!
//! let subscription = relay.watch_channel(
//!     ChannelId::from("general"),
//!     Arc::new(|message| println!("{}: {}", message.sender_id, message.content)),
//! );
//!
//! // On screen unmount
//! subscription.unsubscribe();
//! ```

pub mod feed;
pub mod notify;
pub mod polling;
pub mod registry;

pub use feed::{FeedStatus, MessageCallback, MessageFeed, StopReason, Subscription};
pub use notify::{LogNotifier, NoopNotifier};
pub use polling::{PollingRelay, RelayConfig, Watermark};
pub use registry::InMemoryDeletionRegistry;
