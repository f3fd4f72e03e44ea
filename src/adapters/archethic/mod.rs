//! Archethic Adapters - Node Client and HTLC Collector
//!
//! The client speaks the node's JSON-RPC and GraphQL APIs; the
//! collector turns pool and HTLC contract state into records.

pub mod client;
pub mod collector;

pub use client::{ArchethicClient, ArchethicClientConfig, RpcError};
pub use collector::ArchethicCollector;
