//! EVM Adapters - alloy-rs Providers and HTLC Collector
//!
//! One provider per configured chain; the collector fans out over all
//! of them and merges their records and samples.

pub mod collector;
pub mod contracts;
pub mod provider;

pub use collector::{ChainCollector, EvmCollector};
pub use provider::EvmProvider;
