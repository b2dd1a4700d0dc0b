//! # chat-core
//!
//! Domain layer containing ids, entities, collaborator traits and the clock.
//! This crate has zero dependencies on infrastructure (HTTP, storage, runtime).

pub mod clock;
pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use entities::{AppLifecycle, Message, PresenceEntry, PresenceSnapshot, PresenceStatus};
pub use error::DomainError;
pub use traits::{
    DeletionRegistry, MessageQuery, MessageSource, Notifier, PortResult, PresenceSource,
    SnapshotStore,
};
pub use value_objects::{ChannelId, MessageId, ResourceKey, UserId};
