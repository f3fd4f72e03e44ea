//! Persistence Adapters - Snapshot Store Implementations
//!
//! Implements the SnapshotStore port with one atomically replaced JSON
//! file per key, plus an in-memory variant for tests.
//! No database dependency, lightweight and crash-recoverable.

pub mod json_store;
pub mod memory;

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;
