//! Telemetry Port - Service Self-Instrumentation
//!
//! Use cases report tick and reconciliation outcomes through this
//! trait; the Prometheus adapter implements it. Kept separate from the
//! exposed HTLC samples, which are data, not instrumentation.

use std::time::Duration;

use crate::domain::htlc::Phase;
use crate::domain::reconcile::MergeSummary;

use super::collector::ChainFamily;

/// Sink for service-level instrumentation events.
pub trait Telemetry: Send + Sync + 'static {
  /// A tick published a new metrics snapshot.
  fn tick_succeeded(&self, elapsed: Duration, samples: usize);

  /// A tick failed; `failed` lists the collectors that errored.
  fn tick_failed(&self, elapsed: Duration, failed: &[ChainFamily]);

  /// A swap board was reconciled for `phase`.
  fn swaps_reconciled(&self, phase: Phase, summary: MergeSummary);
}

/// Telemetry sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
  fn tick_succeeded(&self, _elapsed: Duration, _samples: usize) {}

  fn tick_failed(&self, _elapsed: Duration, _failed: &[ChainFamily]) {}

  fn swaps_reconciled(&self, _phase: Phase, _summary: MergeSummary) {}
}
