//! Subscription handle and status channel.

use chat_core::ResourceKey;
use std::fmt;
use tokio::sync::watch;

/// Why a feed stopped delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller unsubscribed
    Unsubscribed,
    /// A newer subscription for the same resource took over
    Replaced,
    /// The channel no longer exists
    Deleted,
    /// Consecutive failures crossed the threshold
    TooManyErrors { errors: u32 },
    /// The feed itself was shut down
    Shutdown,
    /// The polling task ended abnormally
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsubscribed => write!(f, "unsubscribed"),
            Self::Replaced => write!(f, "replaced"),
            Self::Deleted => write!(f, "deleted"),
            Self::TooManyErrors { errors } => write!(f, "gave up after {errors} errors"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Current state of a subscription
///
/// `Active` means "caught up, still watching"; a stopped feed always says why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Active,
    Stopped(StopReason),
}

impl FeedStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Stop reason, if stopped
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Self::Active => None,
            Self::Stopped(reason) => Some(*reason),
        }
    }
}

type Cancel = Box<dyn FnOnce() + Send + Sync>;

/// Handle to a running feed
///
/// Dropping the handle does not stop the feed.
#[must_use = "dropping a Subscription leaves the feed running; call unsubscribe() to stop it"]
pub struct Subscription {
    key: Option<ResourceKey>,
    status: watch::Receiver<FeedStatus>,
    cancel: Option<Cancel>,
}

impl Subscription {
    /// Build a subscription from a status receiver and a cancel action
    pub fn new<F>(key: ResourceKey, status: watch::Receiver<FeedStatus>, cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            key: Some(key),
            status,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription that never started. `unsubscribe` does nothing.
    pub fn stopped(reason: StopReason) -> Self {
        let (_tx, status) = watch::channel(FeedStatus::Stopped(reason));
        Self {
            key: None,
            status,
            cancel: None,
        }
    }

    /// Resource being watched (None for a subscription that never started)
    pub fn key(&self) -> Option<&ResourceKey> {
        self.key.as_ref()
    }

    /// Current status
    pub fn status(&self) -> FeedStatus {
        *self.status.borrow()
    }

    /// Check if the feed is still delivering
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Receiver that observes every status change
    pub fn status_receiver(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    /// Wait until the feed stops and return why
    pub async fn stopped_reason(&mut self) -> StopReason {
        let reason = self
            .status
            .wait_for(|status| !status.is_active())
            .await
            .map(|status| status.stop_reason());

        match reason {
            Ok(Some(reason)) => reason,
            // Sender gone without a final status
            _ => self.status().stop_reason().unwrap_or(StopReason::Shutdown),
        }
    }

    /// Stop the feed
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("status", &self.status())
            .finish()
    }
}
