//! Poller Use Case - Scheduled Fan-out/Fan-in of Chain Collectors
//!
//! Each tick polls the Archethic and EVM collectors concurrently and
//! waits for both. Only a tick where both succeed is published; a
//! failed tick leaves the previous snapshot in place (stale but
//! available) and the next scheduled tick retries.
//!
//! Ticks are awaited inline by the run loop, so a new tick never starts
//! while the previous one is still outstanding.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::ports::collector::{ChainFamily, ChainSnapshot, HtlcCollector};
use crate::ports::telemetry::Telemetry;

use super::aggregator::{Aggregator, MetricsSnapshot};
use super::schedule::TickSchedule;

/// A collector that failed during a tick.
#[derive(Debug)]
pub struct CollectorFailure {
  pub family: ChainFamily,
  pub error: anyhow::Error,
}

/// Tick that could not be published.
#[derive(Debug, Error)]
#[error("tick failed: {}", summarize(.failures))]
pub struct TickError {
  /// Every collector that failed, not just the first.
  pub failures: Vec<CollectorFailure>,
}

impl TickError {
  /// Families whose collectors failed.
  pub fn families(&self) -> Vec<ChainFamily> {
    self.failures.iter().map(|f| f.family).collect()
  }
}

fn summarize(failures: &[CollectorFailure]) -> String {
  failures
    .iter()
    .map(|f| format!("{}: {:#}", f.family, f.error))
    .collect::<Vec<_>>()
    .join("; ")
}

/// Drives collectors on a schedule and publishes their samples.
pub struct Poller {
  archethic: Arc<dyn HtlcCollector>,
  evm: Arc<dyn HtlcCollector>,
  aggregator: Aggregator,
  telemetry: Arc<dyn Telemetry>,
}

impl Poller {
  /// Create a poller over the two chain collectors.
  pub fn new(
    archethic: Arc<dyn HtlcCollector>,
    evm: Arc<dyn HtlcCollector>,
    aggregator: Aggregator,
    telemetry: Arc<dyn Telemetry>,
  ) -> Self {
    Self {
      archethic,
      evm,
      aggregator,
      telemetry,
    }
  }

  /// Poll both collectors once and publish the aggregated samples.
  ///
  /// # Errors
  /// Returns every collector failure of the tick; nothing is published.
  #[instrument(skip(self))]
  pub async fn tick(&self) -> Result<Arc<MetricsSnapshot>, TickError> {
    let started = Instant::now();

    let (archethic, evm) = tokio::join!(self.archethic.poll_snapshot(), self.evm.poll_snapshot());

    match (archethic, evm) {
      (Ok(archethic), Ok(evm)) => {
        let tick_ms = Utc::now().timestamp_millis();
        let snapshot = self.aggregator.publish(&archethic, &evm, tick_ms);
        self
          .telemetry
          .tick_succeeded(started.elapsed(), snapshot.samples.len());
        Ok(snapshot)
      }
      (archethic, evm) => {
        let failures: Vec<CollectorFailure> = [
          (ChainFamily::Archethic, archethic),
          (ChainFamily::Evm, evm),
        ]
        .into_iter()
        .filter_map(|(family, result)| report(family, result))
        .collect();

        let err = TickError { failures };
        self.telemetry.tick_failed(started.elapsed(), &err.families());
        Err(err)
      }
    }
  }

  /// Run one tick immediately, then one per schedule fire time until
  /// shutdown.
  #[instrument(skip_all, fields(cron = %schedule))]
  pub async fn run(
    &self,
    schedule: TickSchedule,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> anyhow::Result<()> {
    info!("Poller started");
    self.tick_logged().await;

    loop {
      let Some(delay) = schedule.delay_from(Utc::now()) else {
        warn!("Schedule has no upcoming fire time, poller idle");
        let _ = shutdown_rx.recv().await;
        return Ok(());
      };

      debug!(delay_ms = delay.as_millis(), "Waiting for next tick");

      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Poller received shutdown signal");
          return Ok(());
        }
        () = tokio::time::sleep(delay) => {
          self.tick_logged().await;
        }
      }
    }
  }

  async fn tick_logged(&self) {
    info!("Tick start");
    match self.tick().await {
      Ok(snapshot) => info!(
        version = snapshot.version,
        samples = snapshot.samples.len(),
        "Tick end"
      ),
      Err(e) => error!(error = %e, "Tick failed, previous metrics kept"),
    }
  }
}

/// Log one collector outcome; return it as a failure if it errored.
fn report(family: ChainFamily, result: anyhow::Result<ChainSnapshot>) -> Option<CollectorFailure> {
  match result {
    Ok(snapshot) => {
      warn!(
        family = %family,
        samples = snapshot.samples.len(),
        records = snapshot.records.len(),
        "Collector succeeded but tick discarded"
      );
      None
    }
    Err(error) => {
      error!(family = %family, error = %format!("{error:#}"), "Collector failed");
      Some(CollectorFailure { family, error })
    }
  }
}
