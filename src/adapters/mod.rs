//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, blockchain RPC, file I/O) and
//! serves the results over HTTP. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `archethic`: Archethic node JSON-RPC / GraphQL client and collector
//! - `evm`: EVM chain interaction via alloy-rs
//! - `http`: axum server for exposition, swap board and probes
//! - `metrics`: Prometheus self-metrics and health checks
//! - `persistence`: JSON file snapshot store

pub mod archethic;
pub mod evm;
pub mod http;
pub mod metrics;
pub mod persistence;
