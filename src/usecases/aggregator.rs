//! Metrics Aggregator - Per-tick Sample Flattening and Publication
//!
//! Concatenates the Archethic and EVM snapshot samples, appends the
//! `tick` timestamp sample, and publishes the result as a new immutable
//! snapshot. Readers hold an `Arc` to whichever snapshot was current
//! when they looked; a publish never mutates a snapshot in place.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, instrument};

use crate::domain::metric::MetricSample;
use crate::ports::collector::ChainSnapshot;

/// Name of the synthetic sample carrying the tick wall-clock time.
pub const TICK_SAMPLE: &str = "tick";

/// Flatten two chain snapshots into the complete sample set of a tick.
///
/// `tick_ms` is the tick's wall-clock time in Unix milliseconds.
pub fn aggregate(primary: &ChainSnapshot, secondary: &ChainSnapshot, tick_ms: i64) -> Vec<MetricSample> {
  let mut samples = Vec::with_capacity(primary.samples.len() + secondary.samples.len() + 1);
  samples.extend(primary.samples.iter().cloned());
  samples.extend(secondary.samples.iter().cloned());

  #[allow(clippy::cast_precision_loss)]
  samples.push(MetricSample::new(TICK_SAMPLE, tick_ms as f64));

  samples
}

/// One published, immutable sample set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
  /// Monotonic publication counter; 0 means nothing published yet.
  pub version: u64,
  /// Unix milliseconds of the tick that produced this snapshot.
  pub published_at_ms: i64,
  /// Complete sample set of the tick.
  pub samples: Vec<MetricSample>,
}

/// Owner of the "current metrics" reference.
///
/// Shared between the poller (writer) and the exposition endpoint
/// (reader). Replacement is a single atomic pointer swap.
#[derive(Debug, Default)]
pub struct MetricsHolder {
  current: ArcSwap<MetricsSnapshot>,
}

impl MetricsHolder {
  /// Create a holder with the empty version-0 snapshot.
  pub fn new() -> Self {
    Self::default()
  }

  /// The snapshot current at the time of the call.
  pub fn current(&self) -> Arc<MetricsSnapshot> {
    self.current.load_full()
  }

  /// Whether at least one tick has been published.
  pub fn has_published(&self) -> bool {
    self.current.load().version > 0
  }

  /// Replace the current snapshot with `samples`.
  pub fn publish(&self, samples: Vec<MetricSample>, published_at_ms: i64) -> Arc<MetricsSnapshot> {
    let mut installed = None;
    self.current.rcu(|previous| {
      let next = Arc::new(MetricsSnapshot {
        version: previous.version + 1,
        published_at_ms,
        samples: samples.clone(),
      });
      installed = Some(Arc::clone(&next));
      next
    });
    // rcu runs the closure at least once; the last run is the one stored.
    installed.unwrap_or_else(|| self.current.load_full())
  }
}

/// Builds and publishes tick sample sets into a [`MetricsHolder`].
#[derive(Debug, Clone)]
pub struct Aggregator {
  holder: Arc<MetricsHolder>,
}

impl Aggregator {
  /// Create an aggregator publishing into `holder`.
  pub const fn new(holder: Arc<MetricsHolder>) -> Self {
    Self { holder }
  }

  /// Shared handle to the published snapshot.
  pub fn holder(&self) -> Arc<MetricsHolder> {
    Arc::clone(&self.holder)
  }

  /// Aggregate both snapshots and make the result current.
  #[instrument(skip_all, fields(tick_ms))]
  pub fn publish(
    &self,
    primary: &ChainSnapshot,
    secondary: &ChainSnapshot,
    tick_ms: i64,
  ) -> Arc<MetricsSnapshot> {
    let samples = aggregate(primary, secondary, tick_ms);
    let snapshot = self.holder.publish(samples, tick_ms);

    debug!(
      version = snapshot.version,
      samples = snapshot.samples.len(),
      primary = primary.samples.len(),
      secondary = secondary.samples.len(),
      "Metrics snapshot published"
    );

    snapshot
  }
}
