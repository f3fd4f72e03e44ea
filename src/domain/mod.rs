//! Domain layer - HTLC records, reconciliation and metric rendering.
//!
//! Pure logic only: no I/O, no async. Everything here is safe to call
//! concurrently and testable in isolation (hexagonal architecture inner
//! ring).

pub mod exposition;
pub mod htlc;
pub mod metric;
pub mod reconcile;
pub mod stats;

// Re-export core types for convenience
pub use htlc::{HtlcRecord, HtlcStatus, Phase, SourceChain};
pub use metric::MetricSample;
pub use reconcile::{Link, LinkKind, MergeSummary, Reconciler, RetiredChains, SwapView};
