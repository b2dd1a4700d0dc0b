//! # chat-client
//!
//! Backend-facing half of the chat client.
//!
//! - [`ApiClient`]: reqwest implementation of `MessageSource` and
//!   `PresenceSource`
//! - [`ClientApp`]: wires the presence cache and the polling relay for the
//!   signed-in user

pub mod api;
pub mod app;

pub use api::{ApiClient, FriendDto, USER_HEADER};
pub use app::{ClientApp, WatchTargets};
