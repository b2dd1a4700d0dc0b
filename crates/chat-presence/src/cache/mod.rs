//! Presence cache module.
//!
//! Tracks contact status and notifies subscribers on every change.

mod handle;
mod presence_cache;

pub use handle::{PresenceHandle, PresenceSubscription};
pub use presence_cache::{PresenceCache, PresenceConfig, RefreshOutcome, SNAPSHOT_KEY};
