//! Collector Port - Per-chain HTLC Data Source
//!
//! One implementation per chain family. Collectors own their upstream
//! clients and their snapshot store handle; the core only sees
//! normalized records and already-shaped metric samples.

use async_trait::async_trait;

use crate::domain::htlc::{HtlcRecord, Phase};
use crate::domain::metric::MetricSample;

/// Chain family served by a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
  /// Archethic ledger (primary side of the swap view).
  Archethic,
  /// EVM-compatible chains (secondary side).
  Evm,
}

impl ChainFamily {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Archethic => "archethic",
      Self::Evm => "evm",
    }
  }
}

impl std::fmt::Display for ChainFamily {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Everything one collector observed during a poll tick.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
  /// Family that produced the snapshot.
  pub family: ChainFamily,
  /// Gauges derived from the observed state, ready for exposition.
  pub samples: Vec<MetricSample>,
  /// Records observed in both phases.
  pub records: Vec<HtlcRecord>,
}

impl ChainSnapshot {
  /// Snapshot with no samples and no records.
  pub const fn empty(family: ChainFamily) -> Self {
    Self {
      family,
      samples: Vec::new(),
      records: Vec::new(),
    }
  }
}

/// Records of both phases, from a single discovery pass.
#[derive(Debug, Clone, Default)]
pub struct PhaseRecords {
  pub chargeable: Vec<HtlcRecord>,
  pub signed: Vec<HtlcRecord>,
}

/// Trait for per-chain HTLC data sources.
///
/// Errors (network failures, malformed upstream data) are returned to
/// the caller untouched; retry policy belongs to the adapter.
#[async_trait]
pub trait HtlcCollector: Send + Sync + 'static {
  /// Chain family this collector serves.
  fn family(&self) -> ChainFamily;

  /// Fetch the normalized records currently in `phase`.
  async fn fetch_records(&self, phase: Phase) -> anyhow::Result<Vec<HtlcRecord>>;

  /// Fetch the records of both phases.
  ///
  /// Collectors whose discovery covers both phases at once override this
  /// to discover a single time.
  async fn fetch_phases(&self) -> anyhow::Result<PhaseRecords> {
    let (chargeable, signed) = tokio::try_join!(
      self.fetch_records(Phase::Chargeable),
      self.fetch_records(Phase::Signed),
    )?;
    Ok(PhaseRecords { chargeable, signed })
  }

  /// Poll the chain once and derive this tick's samples.
  async fn poll_snapshot(&self) -> anyhow::Result<ChainSnapshot>;

  /// Check if the upstream endpoint is reachable.
  async fn is_healthy(&self) -> bool;
}
