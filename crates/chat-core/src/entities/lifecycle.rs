//! App lifecycle - foreground/background transitions reported by the host

use serde::{Deserialize, Serialize};

use super::presence::PresenceStatus;

/// Host application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    /// In the foreground and receiving input
    #[default]
    Active,
    /// Transitioning (e.g. system dialog on top)
    Inactive,
    /// Backgrounded
    Background,
}

impl AppLifecycle {
    /// Presence status the current user should advertise in this state
    #[must_use]
    pub fn presence(&self) -> PresenceStatus {
        match self {
            Self::Active => PresenceStatus::Online,
            Self::Inactive | Self::Background => PresenceStatus::Away,
        }
    }
}
