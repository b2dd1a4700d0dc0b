//! Presence entities - approximate online state of a user

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::value_objects::UserId;

/// User presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// App in foreground
    Online,
    /// App backgrounded
    Away,
    /// Not seen recently, or unknown
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Check if this status should be shown as present
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Away => write!(f, "away"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// One user's cached presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    /// Epoch milliseconds of the last status transition
    pub last_seen: i64,
}

impl PresenceEntry {
    /// Create a new entry
    #[must_use]
    pub fn new(status: PresenceStatus, last_seen: i64) -> Self {
        Self { status, last_seen }
    }

    /// Check if `last_seen` lies further back than `window` at time `now`
    #[must_use]
    pub fn is_expired(&self, now: i64, window: Duration) -> bool {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(self.last_seen) > window_ms
    }
}

/// Full presence map handed to subscribers and persisted as JSON
pub type PresenceSnapshot = HashMap<UserId, PresenceEntry>;
