//! Polling relay.
//!
//! One background task per watched resource. Each tick re-checks the
//! resource, fetches the latest page, and hands new messages to the callback.
//! A loop stops on unsubscribe, on replacement by a newer loop for the same
//! resource, when the channel turns out deleted, or after too many
//! consecutive errors.

use chat_common::RelaySettings;
use chat_core::{
    system_clock, ChannelId, DeletionRegistry, DomainError, Message, MessageQuery,
    MessageSource, Notifier, PortResult, ResourceKey, SharedClock, UserId,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use super::watermark::Watermark;
use crate::feed::{FeedStatus, MessageCallback, MessageFeed, StopReason, Subscription};

/// Polling relay configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Delay between ticks
    pub poll_interval: Duration,
    /// Messages requested per fetch
    pub page_size: u32,
    /// Consecutive errors tolerated; one more stops the loop
    pub error_threshold: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            page_size: 20,
            error_threshold: 2,
        }
    }
}

impl From<&RelaySettings> for RelayConfig {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            page_size: settings.page_size,
            error_threshold: settings.error_threshold,
        }
    }
}

/// What one loop polls
#[derive(Debug, Clone)]
enum PollTarget {
    Channel(ChannelId),
    Direct {
        user_id: UserId,
        target_user_id: UserId,
    },
}

impl PollTarget {
    fn key(&self) -> ResourceKey {
        match self {
            Self::Channel(channel_id) => ResourceKey::Channel(channel_id.clone()),
            Self::Direct {
                user_id,
                target_user_id,
            } => ResourceKey::direct(user_id.clone(), target_user_id.clone()),
        }
    }
}

/// Bookkeeping entry of a running loop
struct ActiveLoop {
    generation: u64,
    task: JoinHandle<()>,
    status: Arc<watch::Sender<FeedStatus>>,
}

impl ActiveLoop {
    fn stop(self, reason: StopReason) {
        self.status.send_replace(FeedStatus::Stopped(reason));
        self.task.abort();
    }
}

/// Clears a loop's bookkeeping when its task goes away while still `Active`
///
/// Normal exits set the status before returning, so this only fires when the
/// task unwinds or is dropped by the runtime.
struct LoopGuard {
    relay: Weak<RelayInner>,
    key: ResourceKey,
    generation: u64,
    status: Arc<watch::Sender<FeedStatus>>,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        if !self.status.borrow().is_active() {
            return;
        }

        if let Some(inner) = self.relay.upgrade() {
            let generation = self.generation;
            inner
                .active
                .remove_if(&self.key, |_, active| active.generation == generation);
        }

        let reason = if std::thread::panicking() {
            error!(resource = %self.key, generation = self.generation, "Polling loop panicked");
            StopReason::Failed
        } else {
            StopReason::Shutdown
        };
        self.status.send_replace(FeedStatus::Stopped(reason));
    }
}

/// Per-loop state carried across ticks
struct PollState {
    target: PollTarget,
    key: ResourceKey,
    generation: u64,
    watermark: Watermark,
    consecutive_errors: u32,
    on_message: MessageCallback,
}

/// Message feed backed by interval polling
///
/// Cheap to clone; all clones share the loop registry. Must be used within a
/// Tokio runtime.
#[derive(Clone)]
pub struct PollingRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    config: RelayConfig,
    source: Arc<dyn MessageSource>,
    deletions: Arc<dyn DeletionRegistry>,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    /// At most one loop per resource
    active: DashMap<ResourceKey, ActiveLoop>,
    next_generation: AtomicU64,
}

impl Drop for RelayInner {
    fn drop(&mut self) {
        for entry in self.active.iter() {
            entry.status.send_replace(FeedStatus::Stopped(StopReason::Shutdown));
            entry.task.abort();
        }
    }
}

impl PollingRelay {
    /// Create a relay using the system clock
    pub fn new(
        config: RelayConfig,
        source: Arc<dyn MessageSource>,
        deletions: Arc<dyn DeletionRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_clock(config, source, deletions, notifier, system_clock())
    }

    /// Create a relay with an explicit clock (used for the initial watermark)
    pub fn with_clock(
        mut config: RelayConfig,
        source: Arc<dyn MessageSource>,
        deletions: Arc<dyn DeletionRegistry>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
    ) -> Self {
        if config.poll_interval.is_zero() {
            warn!("Poll interval must be non-zero, using the default");
            config.poll_interval = RelayConfig::default().poll_interval;
        }

        Self {
            inner: Arc::new(RelayInner {
                config,
                source,
                deletions,
                notifier,
                clock,
                active: DashMap::new(),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Number of running loops
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Check if a loop is running for `key`
    pub fn is_watching(&self, key: &ResourceKey) -> bool {
        self.inner.active.contains_key(key)
    }

    /// Stop every loop
    pub fn shutdown(&self) {
        let keys: Vec<ResourceKey> = self.inner.active.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, active)) = self.inner.active.remove(&key) {
                active.stop(StopReason::Shutdown);
            }
        }
        info!("Polling relay shut down");
    }

    fn start(&self, target: PollTarget, on_message: MessageCallback) -> Subscription {
        let key = target.key();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(resource = %key, "No Tokio runtime, not polling");
            return Subscription::stopped(StopReason::Shutdown);
        };

        // Cancel before start: one loop per resource
        if let Some((_, previous)) = self.inner.active.remove(&key) {
            debug!(resource = %key, "Replacing existing polling loop");
            previous.stop(StopReason::Replaced);
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (status_tx, status_rx) = watch::channel(FeedStatus::Active);
        let status_tx = Arc::new(status_tx);

        let state = PollState {
            target,
            key: key.clone(),
            generation,
            watermark: Watermark::new(self.inner.clock.now_millis()),
            consecutive_errors: 0,
            on_message,
        };

        let task = runtime.spawn(Self::poll_loop(
            Arc::downgrade(&self.inner),
            state,
            Arc::clone(&status_tx),
            self.inner.config.poll_interval,
        ));

        let active = ActiveLoop {
            generation,
            task,
            status: status_tx,
        };
        if let Some(raced) = self.inner.active.insert(key.clone(), active) {
            raced.stop(StopReason::Replaced);
        }

        info!(resource = %key, generation, "Started polling loop");

        let weak = Arc::downgrade(&self.inner);
        let cancel_key = key.clone();
        Subscription::new(key, status_rx, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // A replaced or finished loop is no longer ours to stop
            if let Some((_, active)) = inner
                .active
                .remove_if(&cancel_key, |_, active| active.generation == generation)
            {
                active.stop(StopReason::Unsubscribed);
                debug!(resource = %cancel_key, generation, "Unsubscribed polling loop");
            }
        })
    }

    async fn poll_loop(
        relay: Weak<RelayInner>,
        mut state: PollState,
        status: Arc<watch::Sender<FeedStatus>>,
        period: Duration,
    ) {
        let _guard = LoopGuard {
            relay: relay.clone(),
            key: state.key.clone(),
            generation: state.generation,
            status: Arc::clone(&status),
        };

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(inner) = relay.upgrade() else {
                status.send_replace(FeedStatus::Stopped(StopReason::Shutdown));
                return;
            };

            if let Some(reason) = inner.tick(&mut state).await {
                inner
                    .active
                    .remove_if(&state.key, |_, active| active.generation == state.generation);
                status.send_replace(FeedStatus::Stopped(reason));
                info!(resource = %state.key, reason = %reason, "Polling loop stopped");
                return;
            }
        }
    }
}

impl RelayInner {
    /// Run one poll. Returns a reason when the loop must stop.
    async fn tick(&self, state: &mut PollState) -> Option<StopReason> {
        if let PollTarget::Channel(channel_id) = &state.target {
            if self.deletions.is_deleted(channel_id) {
                return Some(StopReason::Deleted);
            }

            match self.source.check_channel(channel_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    self.deletions.mark_deleted(channel_id);
                    return Some(StopReason::Deleted);
                }
                Err(e) => return self.record_error(state, &e),
            }
        }

        let fetched = self.fetch(&state.target).await;
        match fetched {
            Ok(batch) => {
                state.consecutive_errors = 0;
                let fresh = state.watermark.accept(batch);
                trace!(
                    resource = %state.key,
                    fresh = fresh.len(),
                    watermark = state.watermark.last_seen(),
                    "Poll succeeded"
                );
                self.deliver(state, fresh);
                None
            }
            Err(e) => {
                if let (PollTarget::Channel(channel_id), true) = (&state.target, e.is_not_found())
                {
                    self.deletions.mark_deleted(channel_id);
                    return Some(StopReason::Deleted);
                }
                self.record_error(state, &e)
            }
        }
    }

    async fn fetch(&self, target: &PollTarget) -> PortResult<Vec<Message>> {
        let query = MessageQuery::latest(self.config.page_size);
        match target {
            PollTarget::Channel(channel_id) => {
                self.source.fetch_channel_messages(channel_id, query).await
            }
            PollTarget::Direct {
                user_id,
                target_user_id,
            } => {
                self.source
                    .fetch_direct_messages(user_id, target_user_id, query)
                    .await
            }
        }
    }

    fn deliver(&self, state: &PollState, messages: Vec<Message>) {
        for message in messages {
            if let PollTarget::Direct { user_id, .. } = &state.target {
                if !message.is_from(user_id) {
                    self.notifier.notify(&message);
                }
            }
            (state.on_message)(message);
        }
    }

    fn record_error(&self, state: &mut PollState, error: &DomainError) -> Option<StopReason> {
        state.consecutive_errors += 1;
        warn!(
            resource = %state.key,
            errors = state.consecutive_errors,
            error = %error,
            "Poll failed"
        );

        (state.consecutive_errors > self.config.error_threshold).then_some(
            StopReason::TooManyErrors {
                errors: state.consecutive_errors,
            },
        )
    }
}

impl MessageFeed for PollingRelay {
    fn watch_channel(&self, channel_id: ChannelId, on_message: MessageCallback) -> Subscription {
        if self.inner.deletions.is_deleted(&channel_id) {
            debug!(channel_id = %channel_id, "Channel known deleted, not polling");
            return Subscription::stopped(StopReason::Deleted);
        }
        self.start(PollTarget::Channel(channel_id), on_message)
    }

    fn watch_direct(
        &self,
        user_id: UserId,
        target_user_id: UserId,
        on_message: MessageCallback,
    ) -> Subscription {
        self.start(
            PollTarget::Direct {
                user_id,
                target_user_id,
            },
            on_message,
        )
    }
}

impl std::fmt::Debug for PollingRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingRelay")
            .field("config", &self.inner.config)
            .field("active", &self.inner.active.len())
            .finish()
    }
}
