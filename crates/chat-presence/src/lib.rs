//! # chat-presence
//!
//! Client-side presence tracking for a user's contacts.
//!
//! ## Features
//!
//! - **Presence Cache**: In-memory map of user id to status, refreshed on a
//!   timer and from app lifecycle transitions
//! - **Snapshots**: Best-effort JSON persistence so a restart starts warm
//!
//! ## Example
//!
//! ```ignore
//! use chat_presence::{FileSnapshotStore, PresenceCache, PresenceConfig};
//!
//! let cache = PresenceCache::new(
//!     PresenceConfig::default(),
//!     Arc::new(FileSnapshotStore::new("./.chat-client")),
//!     api_client.clone(),
//! );
//!
//! let handle = cache.initialize(UserId::from("alice"), lifecycle_rx).await;
//! let subscription = cache.subscribe(|snapshot| render_friends(snapshot));
//!
//! // On sign-out
//! subscription.unsubscribe();
//! handle.cleanup();
//! ```

pub mod cache;
pub mod store;

pub use cache::{
    PresenceCache, PresenceConfig, PresenceHandle, PresenceSubscription, RefreshOutcome,
    SNAPSHOT_KEY,
};
pub use store::{FileSnapshotStore, MemorySnapshotStore};
