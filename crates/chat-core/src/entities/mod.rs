//! Domain entities - core client-side objects

mod lifecycle;
mod message;
mod presence;

pub use lifecycle::AppLifecycle;
pub use message::Message;
pub use presence::{PresenceEntry, PresenceSnapshot, PresenceStatus};
