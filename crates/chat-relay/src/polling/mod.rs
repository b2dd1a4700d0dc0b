//! Polling feed.
//!
//! Emulates push delivery by re-fetching the latest page of messages on a
//! fixed interval.

mod relay;
mod watermark;

pub use relay::{PollingRelay, RelayConfig};
pub use watermark::Watermark;
