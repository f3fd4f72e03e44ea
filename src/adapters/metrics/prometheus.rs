//! Prometheus Self-Metrics Registry - Service Observability
//!
//! Instruments the monitor itself (tick outcomes, tick latency,
//! reconciliation results) on a dedicated registry served at
//! `/internal/metrics`. The HTLC gauges exposed on `/metrics` are data
//! collected from the chains and do not go through this registry.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::domain::htlc::Phase;
use crate::domain::reconcile::MergeSummary;
use crate::ports::collector::ChainFamily;
use crate::ports::telemetry::Telemetry;

/// Centralized Prometheus metrics for the monitor.
///
/// All metrics follow the naming convention `htlc_monitor_*`.
pub struct ServiceMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Ticks that published a snapshot.
    pub ticks_total: IntCounter,
    /// Failed ticks per collector family.
    pub tick_failures_total: IntCounterVec,
    /// Wall time of a tick, seconds.
    pub tick_duration_seconds: Histogram,
    /// Whether the last tick succeeded (1) or failed (0).
    pub last_tick_success: IntGauge,
    /// Samples in the published snapshot.
    pub published_samples: IntGauge,
    /// Swap views of the last reconciliation per phase and link kind.
    pub swaps_reconciled: IntGaugeVec,
}

impl ServiceMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_total = IntCounter::new(
            "htlc_monitor_ticks_total",
            "Poll ticks that published a metrics snapshot",
        )?;

        let tick_failures_total = IntCounterVec::new(
            Opts::new(
                "htlc_monitor_tick_failures_total",
                "Poll ticks discarded because a collector failed",
            ),
            &["collector"],
        )?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "htlc_monitor_tick_duration_seconds",
                "Wall time of a poll tick in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let last_tick_success = IntGauge::new(
            "htlc_monitor_last_tick_success",
            "Whether the last poll tick succeeded (1=yes, 0=no)",
        )?;

        let published_samples = IntGauge::new(
            "htlc_monitor_published_samples",
            "Samples in the currently published snapshot",
        )?;

        let swaps_reconciled = IntGaugeVec::new(
            Opts::new(
                "htlc_monitor_swaps_reconciled",
                "Swap views in the last reconciliation by link kind",
            ),
            &["phase", "link"],
        )?;

        // Register all metrics
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_failures_total.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(last_tick_success.clone()))?;
        registry.register(Box::new(published_samples.clone()))?;
        registry.register(Box::new(swaps_reconciled.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            tick_failures_total,
            tick_duration_seconds,
            last_tick_success,
            published_samples,
            swaps_reconciled,
        })
    }

    /// Whether the most recent tick published.
    pub fn last_tick_succeeded(&self) -> bool {
        self.last_tick_success.get() == 1
    }

    /// Encode the registry in the Prometheus text format.
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn as_gauge(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

impl Telemetry for ServiceMetrics {
    fn tick_succeeded(&self, elapsed: Duration, samples: usize) {
        self.ticks_total.inc();
        self.tick_duration_seconds.observe(elapsed.as_secs_f64());
        self.last_tick_success.set(1);
        self.published_samples.set(as_gauge(samples));
    }

    fn tick_failed(&self, elapsed: Duration, failed: &[ChainFamily]) {
        for family in failed {
            self.tick_failures_total
                .with_label_values(&[family.as_str()])
                .inc();
        }
        self.tick_duration_seconds.observe(elapsed.as_secs_f64());
        self.last_tick_success.set(0);
    }

    fn swaps_reconciled(&self, phase: Phase, summary: MergeSummary) {
        for (link, count) in [
            ("explicit", summary.explicit),
            ("lock_time", summary.lock_time),
            ("unlinked", summary.unlinked),
        ] {
            self.swaps_reconciled
                .with_label_values(&[phase.as_str(), link])
                .set(as_gauge(count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_outcomes_recorded() {
        let metrics = ServiceMetrics::new().unwrap();
        assert!(!metrics.last_tick_succeeded());

        metrics.tick_succeeded(Duration::from_millis(250), 42);
        assert!(metrics.last_tick_succeeded());
        assert_eq!(metrics.ticks_total.get(), 1);
        assert_eq!(metrics.published_samples.get(), 42);

        metrics.tick_failed(Duration::from_millis(100), &[ChainFamily::Evm]);
        assert!(!metrics.last_tick_succeeded());
        assert_eq!(
            metrics
                .tick_failures_total
                .with_label_values(&["evm"])
                .get(),
            1
        );
    }

    #[test]
    fn test_gather_text_contains_swap_gauges() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.swaps_reconciled(
            Phase::Signed,
            MergeSummary {
                explicit: 3,
                lock_time: 1,
                unlinked: 0,
            },
        );

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("htlc_monitor_swaps_reconciled{link=\"explicit\",phase=\"signed\"} 3"));
        assert!(text.contains("# TYPE htlc_monitor_ticks_total counter"));
    }
}
