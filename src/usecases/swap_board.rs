//! Swap Board Use Case - On-demand Cross-chain Swap View
//!
//! Fetches chargeable and signed records from both chain families
//! concurrently, reconciles each phase, and returns the chargeable
//! views followed by the signed views.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::htlc::{HtlcRecord, Phase};
use crate::domain::reconcile::{MergeSummary, Reconciler, SwapView};
use crate::ports::collector::HtlcCollector;
use crate::ports::telemetry::Telemetry;

/// Reconciled views of one phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseBoard {
  pub phase: Phase,
  pub summary: MergeSummary,
  pub swaps: Vec<SwapView>,
}

/// Reconciled views of both phases.
#[derive(Debug, Clone, Serialize)]
pub struct SwapBoard {
  pub generated_at: DateTime<Utc>,
  pub chargeable: PhaseBoard,
  pub signed: PhaseBoard,
}

impl SwapBoard {
  /// All views, chargeable first.
  pub fn swaps(&self) -> impl Iterator<Item = &SwapView> {
    self.chargeable.swaps.iter().chain(&self.signed.swaps)
  }

  /// Combined summary of both phases.
  pub const fn summary(&self) -> MergeSummary {
    MergeSummary {
      explicit: self.chargeable.summary.explicit + self.signed.summary.explicit,
      lock_time: self.chargeable.summary.lock_time + self.signed.summary.lock_time,
      unlinked: self.chargeable.summary.unlinked + self.signed.summary.unlinked,
    }
  }
}

/// Builds swap boards from the two collectors.
pub struct SwapBoardService {
  archethic: Arc<dyn HtlcCollector>,
  evm: Arc<dyn HtlcCollector>,
  reconciler: Reconciler,
  telemetry: Arc<dyn Telemetry>,
}

impl SwapBoardService {
  /// Create a swap board service.
  pub fn new(
    archethic: Arc<dyn HtlcCollector>,
    evm: Arc<dyn HtlcCollector>,
    reconciler: Reconciler,
    telemetry: Arc<dyn Telemetry>,
  ) -> Self {
    Self {
      archethic,
      evm,
      reconciler,
      telemetry,
    }
  }

  /// Fetch both phases from both families and reconcile them.
  ///
  /// Each family is asked once for both phases, so its discovery runs a
  /// single time per board.
  ///
  /// # Errors
  /// Fails if either family's fetch fails.
  #[instrument(skip(self))]
  pub async fn build(&self) -> Result<SwapBoard> {
    let (archethic, evm) = tokio::try_join!(
      async {
        self
          .archethic
          .fetch_phases()
          .await
          .context("Failed to fetch Archethic HTLCs")
      },
      async { self.evm.fetch_phases().await.context("Failed to fetch EVM HTLCs") },
    )?;

    let chargeable = self.phase_board(Phase::Chargeable, &archethic.chargeable, &evm.chargeable);
    let signed = self.phase_board(Phase::Signed, &archethic.signed, &evm.signed);

    let board = SwapBoard {
      generated_at: Utc::now(),
      chargeable,
      signed,
    };

    let summary = board.summary();
    info!(
      swaps = summary.total(),
      explicit = summary.explicit,
      lock_time = summary.lock_time,
      unlinked = summary.unlinked,
      "Swap board reconciled"
    );

    Ok(board)
  }

  fn phase_board(
    &self,
    phase: Phase,
    primary: &[HtlcRecord],
    secondary: &[HtlcRecord],
  ) -> PhaseBoard {
    let swaps = self.reconciler.merge(primary, secondary, phase);
    let summary = MergeSummary::of(&swaps);
    self.telemetry.swaps_reconciled(phase, summary);
    PhaseBoard {
      phase,
      summary,
      swaps,
    }
  }
}
