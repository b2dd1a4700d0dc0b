//! Collaborator traits

mod ports;

pub use ports::{
    DeletionRegistry, MessageQuery, MessageSource, Notifier, PortResult, PresenceSource,
    SnapshotStore,
};
