//! Snapshot stores.
//!
//! Implementations of `SnapshotStore` for device storage and tests.

mod file_store;
mod memory_store;

pub use file_store::FileSnapshotStore;
pub use memory_store::MemorySnapshotStore;
