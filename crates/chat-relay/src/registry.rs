//! Deletion registry.
//!
//! Remembers channels found to be deleted so later listeners short-circuit
//! instead of polling a dead resource.

use chat_core::{ChannelId, DeletionRegistry};
use dashmap::DashSet;
use tracing::debug;

/// Deletion registry kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryDeletionRegistry {
    deleted: DashSet<ChannelId>,
}

impl InMemoryDeletionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget a deletion (e.g. the channel id got reused)
    pub fn forget(&self, channel_id: &ChannelId) -> bool {
        self.deleted.remove(channel_id).is_some()
    }

    /// Number of channels known to be deleted
    pub fn len(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
    }
}

impl DeletionRegistry for InMemoryDeletionRegistry {
    fn is_deleted(&self, channel_id: &ChannelId) -> bool {
        self.deleted.contains(channel_id)
    }

    fn mark_deleted(&self, channel_id: &ChannelId) {
        if self.deleted.insert(channel_id.clone()) {
            debug!(channel_id = %channel_id, "Channel marked deleted");
        }
    }
}
