//! Client wiring: presence cache + polling relay for one signed-in user

use chat_common::{AppResult, ClientConfig};
use chat_core::{
    AppLifecycle, ChannelId, DeletionRegistry, Notifier, PresenceStatus, SnapshotStore, UserId,
};
use chat_presence::{FileSnapshotStore, PresenceCache, PresenceConfig};
use chat_relay::{
    InMemoryDeletionRegistry, LogNotifier, MessageCallback, MessageFeed, PollingRelay,
    RelayConfig, StopReason, Subscription,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ApiClient;

/// Resources the binary should watch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTargets {
    pub channel_id: Option<ChannelId>,
    pub target_user_id: Option<UserId>,
}

impl WatchTargets {
    /// Read `WATCH_CHANNEL_ID` / `WATCH_TARGET_USER_ID` from the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read targets through an arbitrary lookup. Blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            channel_id: read("WATCH_CHANNEL_ID").map(ChannelId::from),
            target_user_id: read("WATCH_TARGET_USER_ID").map(UserId::from),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel_id.is_none() && self.target_user_id.is_none()
    }
}

/// The client's service objects, owned together
pub struct ClientApp {
    user_id: UserId,
    presence: PresenceCache,
    relay: PollingRelay,
    lifecycle: watch::Sender<AppLifecycle>,
}

impl ClientApp {
    /// Build the app from configuration: file snapshots and log notifications
    pub fn new(config: &ClientConfig) -> AppResult<Self> {
        let user_id = UserId::from(config.session.current_user_id.as_str());
        let api = Arc::new(ApiClient::new(&config.api, user_id)?);
        let store = Arc::new(FileSnapshotStore::new(config.presence.snapshot_dir.clone()));

        Ok(Self::with_parts(
            config,
            api,
            store,
            Arc::new(InMemoryDeletionRegistry::new()),
            Arc::new(LogNotifier),
        ))
    }

    /// Build the app around explicit collaborators
    pub fn with_parts(
        config: &ClientConfig,
        api: Arc<ApiClient>,
        store: Arc<dyn SnapshotStore>,
        deletions: Arc<dyn DeletionRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let user_id = api.user_id().clone();
        let presence = PresenceCache::new(
            PresenceConfig::from(&config.presence),
            store,
            api.clone(),
        );
        let relay = PollingRelay::new(RelayConfig::from(&config.relay), api, deletions, notifier);
        let (lifecycle, _) = watch::channel(AppLifecycle::Active);

        Self {
            user_id,
            presence,
            relay,
            lifecycle,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn presence(&self) -> &PresenceCache {
        &self.presence
    }

    pub fn relay(&self) -> &PollingRelay {
        &self.relay
    }

    /// Report a foreground/background transition
    pub fn set_lifecycle(&self, state: AppLifecycle) {
        self.lifecycle.send_replace(state);
    }

    /// Track presence and watch `targets` until `shutdown` resolves, then
    /// tear everything down
    pub async fn run_until<S>(
        &self,
        targets: &WatchTargets,
        on_message: MessageCallback,
        shutdown: S,
    ) -> AppResult<()>
    where
        S: Future<Output = ()>,
    {
        let handle = self
            .presence
            .initialize(self.user_id.clone(), self.lifecycle.subscribe())
            .await;
        if handle.is_inert() {
            warn!(user_id = %self.user_id, "Presence tracking disabled");
        }

        let presence_subscription = self.presence.subscribe(|snapshot| {
            let online = snapshot
                .values()
                .filter(|entry| entry.status == PresenceStatus::Online)
                .count();
            info!(tracked = snapshot.len(), online, "Presence updated");
        });

        let outcome = self.presence.refresh_statuses(&self.user_id).await;
        info!(
            added = outcome.added,
            updated = outcome.updated,
            expired = outcome.expired,
            "Initial presence refresh"
        );

        let mut subscriptions = Vec::new();
        if let Some(channel_id) = &targets.channel_id {
            subscriptions.push(
                self.relay
                    .watch_channel(channel_id.clone(), Arc::clone(&on_message)),
            );
        }
        if let Some(target_user_id) = &targets.target_user_id {
            subscriptions.push(self.relay.watch_direct(
                self.user_id.clone(),
                target_user_id.clone(),
                Arc::clone(&on_message),
            ));
        }
        if subscriptions.is_empty() {
            warn!("No channel or conversation to watch, tracking presence only");
        }

        let monitors: Vec<JoinHandle<()>> = subscriptions.iter().map(monitor).collect();

        shutdown.await;
        info!("Shutting down client");

        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        for monitor in monitors {
            monitor.abort();
        }
        self.relay.shutdown();

        presence_subscription.unsubscribe();
        handle.set_status(PresenceStatus::Offline);
        handle.cleanup();
        self.presence.flush().await;

        Ok(())
    }
}

/// Log when a feed stops on its own
fn monitor(subscription: &Subscription) -> JoinHandle<()> {
    let mut status = subscription.status_receiver();
    let resource = subscription
        .key()
        .map_or_else(|| "unknown".to_string(), ToString::to_string);

    tokio::spawn(async move {
        let reason = status
            .wait_for(|status| !status.is_active())
            .await
            .ok()
            .and_then(|status| status.stop_reason());

        match reason {
            Some(StopReason::Deleted) => warn!(resource = %resource, "Channel was deleted"),
            Some(reason @ (StopReason::TooManyErrors { .. } | StopReason::Failed)) => {
                warn!(resource = %resource, reason = %reason, "Stopped watching");
            }
            Some(reason) => info!(resource = %resource, reason = %reason, "Stopped watching"),
            None => {}
        }
    })
}

impl std::fmt::Debug for ClientApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientApp")
            .field("user_id", &self.user_id)
            .field("relay", &self.relay)
            .finish()
    }
}
