//! In-memory presence cache.
//!
//! Holds one `PresenceEntry` per known user. Mutations come from explicit
//! status updates, app lifecycle transitions and the periodic refresh; every
//! mutation notifies subscribers with the full map and persists a snapshot in
//! the background.

use chat_common::PresenceSettings;
use chat_core::{
    system_clock, AppLifecycle, DomainError, PortResult, PresenceEntry, PresenceSnapshot,
    PresenceSource, PresenceStatus, SharedClock, SnapshotStore, UserId,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use super::handle::{PresenceHandle, PresenceSubscription};

/// Storage key of the persisted snapshot
pub const SNAPSHOT_KEY: &str = "user_status_cache";

/// Refresh period (1 minute)
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Entries not updated for this long are forced offline (5 minutes)
const DEFAULT_EXPIRY: Duration = Duration::from_secs(300);

pub(crate) type Listener = Arc<dyn Fn(&PresenceSnapshot) + Send + Sync>;

/// Presence cache configuration
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Period of the background refresh
    pub refresh_interval: Duration,
    /// Age after which another user's entry is forced offline
    pub expiry: Duration,
    /// Key the snapshot is stored under
    pub snapshot_key: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            expiry: DEFAULT_EXPIRY,
            snapshot_key: SNAPSHOT_KEY.to_string(),
        }
    }
}

impl From<&PresenceSettings> for PresenceConfig {
    fn from(settings: &PresenceSettings) -> Self {
        Self {
            refresh_interval: settings.refresh_interval(),
            expiry: settings.expiry(),
            snapshot_key: SNAPSHOT_KEY.to_string(),
        }
    }
}

/// What a refresh pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Entries forced offline by expiry
    pub expired: usize,
    /// Friends seen for the first time
    pub added: usize,
    /// Known friends whose reported status changed
    pub updated: usize,
}

impl RefreshOutcome {
    /// Check if the pass left the cache untouched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.added == 0 && self.updated == 0
    }
}

/// Process-wide presence cache, owned by whoever wires the client together
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct PresenceCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: PresenceConfig,
    entries: RwLock<PresenceSnapshot>,
    listeners: RwLock<Vec<(Uuid, Listener)>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    store: Arc<dyn SnapshotStore>,
    source: Arc<dyn PresenceSource>,
    clock: SharedClock,
    /// Sequence number of the latest scheduled snapshot
    persist_seq: AtomicU64,
    /// Highest snapshot sequence already handled; serializes writes
    persisted: Arc<tokio::sync::Mutex<u64>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl PresenceCache {
    /// Create a cache using the system clock
    pub fn new(
        config: PresenceConfig,
        store: Arc<dyn SnapshotStore>,
        source: Arc<dyn PresenceSource>,
    ) -> Self {
        Self::with_clock(config, store, source, system_clock())
    }

    /// Create a cache with an explicit clock
    pub fn with_clock(
        config: PresenceConfig,
        store: Arc<dyn SnapshotStore>,
        source: Arc<dyn PresenceSource>,
        clock: SharedClock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                entries: RwLock::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
                store,
                source,
                clock,
                persist_seq: AtomicU64::new(0),
                persisted: Arc::new(tokio::sync::Mutex::new(0)),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PresenceConfig {
        &self.inner.config
    }

    /// Start tracking presence for `current_user`
    ///
    /// Restores the persisted snapshot, marks the user online, starts the
    /// refresh timer and follows `lifecycle` to flip between online and away.
    /// Never fails: on error the returned handle is inert.
    pub async fn initialize(
        &self,
        current_user: UserId,
        lifecycle: watch::Receiver<AppLifecycle>,
    ) -> PresenceHandle {
        match self.try_initialize(current_user.clone(), lifecycle).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(user_id = %current_user, error = %e, "Presence initialization failed");
                PresenceHandle::inert()
            }
        }
    }

    async fn try_initialize(
        &self,
        current_user: UserId,
        mut lifecycle: watch::Receiver<AppLifecycle>,
    ) -> PortResult<PresenceHandle> {
        if current_user.is_empty() {
            return Err(DomainError::ValidationError(
                "current user id is empty".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DomainError::InternalError(e.to_string()))?;

        self.restore().await;
        self.set_user_status(&current_user, PresenceStatus::Online);

        // The initial lifecycle value is covered by the online mark above
        lifecycle.mark_unchanged();

        let refresh = runtime.spawn(Self::refresh_loop(
            Arc::downgrade(&self.inner),
            current_user.clone(),
            self.inner.config.refresh_interval,
        ));
        let lifecycle = runtime.spawn(Self::lifecycle_loop(
            Arc::downgrade(&self.inner),
            current_user.clone(),
            lifecycle,
        ));

        let previous = std::mem::replace(&mut *self.inner.tasks.lock(), vec![refresh, lifecycle]);
        for task in previous {
            task.abort();
        }

        info!(user_id = %current_user, "Presence tracking started");

        Ok(PresenceHandle::new(self.clone(), current_user))
    }

    async fn refresh_loop(inner: Weak<Inner>, current_user: UserId, period: Duration) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            PresenceCache { inner }.refresh_statuses(&current_user).await;
        }
    }

    async fn lifecycle_loop(
        inner: Weak<Inner>,
        current_user: UserId,
        mut lifecycle: watch::Receiver<AppLifecycle>,
    ) {
        while lifecycle.changed().await.is_ok() {
            let state = *lifecycle.borrow_and_update();
            let Some(inner) = inner.upgrade() else {
                break;
            };

            debug!(user_id = %current_user, state = ?state, "App lifecycle changed");
            PresenceCache { inner }.set_user_status(&current_user, state.presence());
        }
    }

    /// Merge the persisted snapshot into memory. In-memory entries win.
    async fn restore(&self) {
        let key = &self.inner.config.snapshot_key;
        match self.inner.store.load(key).await {
            Ok(Some(json)) => match serde_json::from_str::<PresenceSnapshot>(&json) {
                Ok(snapshot) => {
                    let count = snapshot.len();
                    let mut entries = self.inner.entries.write();
                    for (user_id, entry) in snapshot {
                        entries.entry(user_id).or_insert(entry);
                    }
                    debug!(count, "Restored presence snapshot");
                }
                Err(e) => warn!(error = %e, "Discarding unreadable presence snapshot"),
            },
            Ok(None) => trace!("No presence snapshot stored"),
            Err(e) => warn!(error = %e, "Failed to load presence snapshot"),
        }
    }

    /// Overwrite one user's status and `last_seen`
    pub fn set_user_status(&self, user_id: &UserId, status: PresenceStatus) {
        let now = self.inner.clock.now_millis();
        self.inner
            .entries
            .write()
            .insert(user_id.clone(), PresenceEntry::new(status, now));

        debug!(user_id = %user_id, status = %status, "Set user status");

        self.notify();
        self.persist();
    }

    /// Get a user's status; unknown users are offline
    pub fn get_user_status(&self, user_id: &UserId) -> PresenceStatus {
        self.inner
            .entries
            .read()
            .get(user_id)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Get a user's full entry
    pub fn get_entry(&self, user_id: &UserId) -> Option<PresenceEntry> {
        self.inner.entries.read().get(user_id).copied()
    }

    /// Check if a user is online
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.get_user_status(user_id) == PresenceStatus::Online
    }

    /// Copy of the whole cache
    pub fn snapshot(&self) -> PresenceSnapshot {
        self.inner.entries.read().clone()
    }

    /// Periodic refresh pass
    ///
    /// Expires stale entries of other users, then applies what the presence
    /// source reports for the current user's friends. Source failures are
    /// logged; expiry still applies.
    #[instrument(skip(self, current_user), fields(user_id = %current_user))]
    pub async fn refresh_statuses(&self, current_user: &UserId) -> RefreshOutcome {
        let friends = match self.inner.source.friends(current_user).await {
            Ok(friends) => friends,
            Err(e) => {
                warn!(error = %e, "Failed to fetch friends list");
                Vec::new()
            }
        };

        let reports = if friends.is_empty() {
            HashMap::new()
        } else {
            match self.inner.source.statuses(&friends).await {
                Ok(reports) => reports,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch friend statuses");
                    HashMap::new()
                }
            }
        };

        let now = self.inner.clock.now_millis();
        let expiry = self.inner.config.expiry;
        let mut outcome = RefreshOutcome::default();
        let mut touched = 0usize;

        {
            let mut entries = self.inner.entries.write();

            for (user_id, entry) in entries.iter_mut() {
                if user_id != current_user
                    && entry.status != PresenceStatus::Offline
                    && entry.is_expired(now, expiry)
                {
                    entry.status = PresenceStatus::Offline;
                    outcome.expired += 1;
                }
            }

            for friend in friends.iter().filter(|id| *id != current_user) {
                let reported = reports.get(friend).map(|report| {
                    if report.is_expired(now, expiry) {
                        PresenceEntry::new(PresenceStatus::Offline, report.last_seen)
                    } else {
                        *report
                    }
                });

                match entries.get_mut(friend) {
                    None => {
                        let entry = reported
                            .unwrap_or_else(|| PresenceEntry::new(PresenceStatus::Offline, now));
                        entries.insert(friend.clone(), entry);
                        outcome.added += 1;
                    }
                    Some(existing) => {
                        let Some(report) = reported else {
                            continue;
                        };
                        if report.last_seen < existing.last_seen {
                            continue;
                        }
                        if report.status != existing.status {
                            *existing = report;
                            outcome.updated += 1;
                        } else if report.last_seen > existing.last_seen {
                            // Same status, newer sighting: keeps the entry from expiring
                            existing.last_seen = report.last_seen;
                            touched += 1;
                        }
                    }
                }
            }
        }

        if !outcome.is_empty() {
            debug!(
                expired = outcome.expired,
                added = outcome.added,
                updated = outcome.updated,
                "Presence refreshed"
            );
            self.notify();
            self.persist();
        } else if touched > 0 {
            trace!(touched, "Presence last-seen advanced");
            self.persist();
        }

        outcome
    }

    /// Register a listener called with the full map after every mutation
    pub fn subscribe<F>(&self, callback: F) -> PresenceSubscription
    where
        F: Fn(&PresenceSnapshot) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.inner.listeners.write().push((id, Arc::new(callback)));
        PresenceSubscription::new(self.clone(), id)
    }

    pub(crate) fn remove_listener(&self, id: Uuid) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Check if the refresh or lifecycle tasks are still running
    pub fn is_running(&self) -> bool {
        self.inner.tasks.lock().iter().any(|task| !task.is_finished())
    }

    /// Drop all listeners and stop the background tasks
    pub fn cleanup(&self) {
        self.inner.listeners.write().clear();
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        debug!("Presence cache cleaned up");
    }

    fn notify(&self) {
        let snapshot = self.inner.entries.read().clone();
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(&snapshot);
        }
    }

    /// Schedule a snapshot write. Writes are serialized and never go back in
    /// time: a snapshot older than the last handled one is skipped.
    fn persist(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, presence snapshot not persisted");
            return;
        };

        // Sequence numbers follow serialization order
        let (json, seq) = {
            let entries = self.inner.entries.read();
            match serde_json::to_string(&*entries) {
                Ok(json) => (json, self.inner.persist_seq.fetch_add(1, Ordering::SeqCst) + 1),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize presence snapshot");
                    return;
                }
            }
        };

        let store = Arc::clone(&self.inner.store);
        let key = self.inner.config.snapshot_key.clone();
        let persisted = Arc::clone(&self.inner.persisted);

        runtime.spawn(async move {
            let mut last = persisted.lock().await;
            if *last > seq {
                trace!(seq, last = *last, "Skipping stale presence snapshot");
                return;
            }
            if let Err(e) = store.save(&key, &json).await {
                warn!(error = %e, "Failed to persist presence snapshot");
            }
            *last = seq;
        });
    }

    /// Wait until every scheduled snapshot write has been handled
    pub async fn flush(&self) {
        let target = self.inner.persist_seq.load(Ordering::SeqCst);
        loop {
            if *self.inner.persisted.lock().await >= target {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

impl std::fmt::Debug for PresenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceCache")
            .field("entries", &self.inner.entries.read().len())
            .field("listeners", &self.inner.listeners.read().len())
            .field("config", &self.inner.config)
            .finish()
    }
}
