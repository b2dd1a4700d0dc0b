//! Handles returned to callers of the presence cache.

use chat_core::{PresenceStatus, UserId};
use uuid::Uuid;

use super::presence_cache::PresenceCache;

/// Handle for the signed-in user's presence session
///
/// An inert handle (returned when initialization fails) accepts every call
/// and does nothing.
#[derive(Debug, Clone)]
pub struct PresenceHandle {
    bound: Option<(PresenceCache, UserId)>,
}

impl PresenceHandle {
    pub(crate) fn new(cache: PresenceCache, user_id: UserId) -> Self {
        Self {
            bound: Some((cache, user_id)),
        }
    }

    /// Handle that ignores every call
    #[must_use]
    pub fn inert() -> Self {
        Self { bound: None }
    }

    /// Check if this handle is a no-op
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.bound.is_none()
    }

    /// User this handle tracks
    pub fn user_id(&self) -> Option<&UserId> {
        self.bound.as_ref().map(|(_, user_id)| user_id)
    }

    /// Set the current user's status
    pub fn set_status(&self, status: PresenceStatus) {
        if let Some((cache, user_id)) = &self.bound {
            cache.set_user_status(user_id, status);
        }
    }

    /// Stop background work and drop all listeners
    pub fn cleanup(&self) {
        if let Some((cache, _)) = &self.bound {
            cache.cleanup();
        }
    }
}

/// Registration of a presence listener
#[derive(Debug)]
pub struct PresenceSubscription {
    cache: PresenceCache,
    id: Uuid,
}

impl PresenceSubscription {
    pub(crate) fn new(cache: PresenceCache, id: Uuid) -> Self {
        Self { cache, id }
    }

    /// Listener id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone (e.g. after
    /// `cleanup`).
    pub fn unsubscribe(self) -> bool {
        self.cache.remove_listener(self.id)
    }
}
