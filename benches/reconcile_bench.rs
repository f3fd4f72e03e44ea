//! Reconciliation and Exposition Benchmarks - Request-Path Performance
//!
//! Benchmarks the pure functions that run on every `/htlcs` and
//! `/metrics` request.
//!
//! Run with: cargo bench --bench reconcile_bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use htlc_monitor::domain::exposition::format;
use htlc_monitor::domain::htlc::{HtlcRecord, HtlcStatus, Phase, SourceChain};
use htlc_monitor::domain::metric::MetricSample;
use htlc_monitor::domain::reconcile::Reconciler;
use htlc_monitor::domain::stats::htlc_samples;

fn record(source: SourceChain, index: u64, reference: Option<String>) -> HtlcRecord {
    HtlcRecord {
        source,
        phase: Phase::Chargeable,
        address: format!("0x{index:040x}"),
        lock_time: 1_700_000_000 + index * 3,
        counterparty_contract: reference,
        counterparty_chain_id: Some(1),
        status: HtlcStatus::Pending,
        amount: Decimal::ONE,
        token: "ETH".to_string(),
        user_address: None,
        secret_hash: None,
        creation_time: None,
    }
}

/// Half of the primaries name their counterpart, half rely on lock time.
fn fixture(size: u64) -> (Vec<HtlcRecord>, Vec<HtlcRecord>) {
    let primary = (0..size)
        .map(|i| {
            let reference = (i % 2 == 0).then(|| format!("0x{i:040X}"));
            record(SourceChain::Archethic, i, reference)
        })
        .collect();
    let secondary = (0..size)
        .map(|i| record(SourceChain::Evm { chain_id: 1 }, i, None))
        .collect();
    (primary, secondary)
}

/// Benchmark merging one phase at several board sizes.
fn bench_merge(c: &mut Criterion) {
    let reconciler = Reconciler::default();
    let mut group = c.benchmark_group("merge");

    for size in [10u64, 100, 1_000] {
        let (primary, secondary) = fixture(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| reconciler.merge(black_box(&primary), black_box(&secondary), Phase::Chargeable));
        });
    }

    group.finish();
}

/// Benchmark exposition of a realistic tick sample set.
fn bench_format(c: &mut Criterion) {
    let (primary, secondary) = fixture(1_000);
    let mut samples: Vec<MetricSample> = htlc_samples("archethic", &[], &primary, 1_700_001_000);
    for chain in ["1", "56", "137"] {
        samples.extend(htlc_samples("evm", &[("chain_id", chain)], &secondary, 1_700_001_000));
    }
    samples.reverse();

    c.bench_function("format_tick_samples", |b| {
        b.iter(|| format(black_box(&samples)));
    });
}

criterion_group!(benches, bench_merge, bench_format);
criterion_main!(benches);
