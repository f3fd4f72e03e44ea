//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `HtlcCollector`: per-chain HTLC records and tick snapshots
//! - `SnapshotStore`: key-value JSON cache used by collectors
//! - `Telemetry`: service self-instrumentation sink

pub mod collector;
pub mod store;
pub mod telemetry;
