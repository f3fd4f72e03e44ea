//! Metrics Adapters - Prometheus Self-Instrumentation and Health
//!
//! `ServiceMetrics` implements the Telemetry port; `health` serves the
//! liveness and readiness probes.

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use prometheus::ServiceMetrics;
