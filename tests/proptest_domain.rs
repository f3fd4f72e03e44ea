//! Property-Based Tests - Domain Layer Invariants
//!
//! Uses `proptest` to verify that reconciliation and exposition keep
//! their invariants across random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;

use htlc_monitor::domain::exposition::format;
use htlc_monitor::domain::htlc::{HtlcRecord, HtlcStatus, Phase, SourceChain};
use htlc_monitor::domain::metric::{MetricSample, base_name};
use htlc_monitor::domain::reconcile::{LOCK_TIME_TOLERANCE_SECS, LinkKind, Reconciler, RetiredChains};

const RETIRED: u64 = 80_001;

fn archethic(index: usize, lock_time: u64, reference: Option<String>, chain_id: u64) -> HtlcRecord {
    HtlcRecord {
        source: SourceChain::Archethic,
        phase: Phase::Signed,
        address: format!("0000{index:04x}"),
        lock_time,
        counterparty_contract: reference,
        counterparty_chain_id: Some(chain_id),
        status: HtlcStatus::Pending,
        amount: Decimal::ONE,
        token: "UCO".to_string(),
        user_address: None,
        secret_hash: None,
        creation_time: None,
    }
}

fn evm(index: usize, lock_time: u64, chain_id: u64) -> HtlcRecord {
    HtlcRecord {
        source: SourceChain::Evm { chain_id },
        phase: Phase::Signed,
        address: format!("0xAbC{index:04x}"),
        lock_time,
        counterparty_contract: None,
        counterparty_chain_id: None,
        status: HtlcStatus::Pending,
        amount: Decimal::ONE,
        token: "ETH".to_string(),
        user_address: None,
        secret_hash: None,
        creation_time: None,
    }
}

/// Lock times clustered in a narrow band so near-collisions are common.
fn lock_time() -> impl Strategy<Value = u64> {
    1_000u64..1_012
}

fn chain_id() -> impl Strategy<Value = u64> {
    prop_oneof![4 => Just(1u64), 1 => Just(RETIRED)]
}

fn secondaries() -> impl Strategy<Value = Vec<HtlcRecord>> {
    prop::collection::vec((lock_time(), chain_id()), 0..8).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (lock, chain))| evm(i, lock, chain))
            .collect()
    })
}

/// Primaries that reference secondary `i` (by index, any case) or nothing.
fn primaries() -> impl Strategy<Value = Vec<HtlcRecord>> {
    prop::collection::vec(
        (lock_time(), prop::option::of((0usize..10, any::<bool>())), chain_id()),
        0..8,
    )
    .prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (lock, reference, chain))| {
                let reference = reference.map(|(target, upper)| {
                    let address = format!("0xabc{target:04x}");
                    if upper { address.to_uppercase() } else { address }
                });
                archethic(i, lock, reference, chain)
            })
            .collect()
    })
}

// ── Reconciliation Properties ───────────────────────────────

proptest! {
    /// An explicit link always points at the named address, and a named
    /// address never falls back to a lock-time link.
    #[test]
    fn explicit_links_match_reference(primary in primaries(), secondary in secondaries()) {
        let views = Reconciler::default().merge(&primary, &secondary, Phase::Signed);

        for view in &views {
            match view.record.counterparty_contract.as_deref() {
                Some(reference) => {
                    let expected = secondary
                        .iter()
                        .filter(|s| s.chain_id() != Some(RETIRED))
                        .find(|s| s.address.eq_ignore_ascii_case(reference));
                    prop_assert_eq!(view.linked_record(), expected);
                    if view.link.is_some() {
                        prop_assert_eq!(view.link_kind(), Some(LinkKind::Explicit));
                    }
                }
                None => prop_assert_ne!(view.link_kind(), Some(LinkKind::Explicit)),
            }
        }
    }

    /// A lock-time link exists iff exactly one candidate is within tolerance.
    #[test]
    fn lock_time_links_are_unique(primary in primaries(), secondary in secondaries()) {
        let views = Reconciler::default().merge(&primary, &secondary, Phase::Signed);

        for view in views.iter().filter(|v| v.record.counterparty_contract.is_none()) {
            let within: Vec<&HtlcRecord> = secondary
                .iter()
                .filter(|s| s.chain_id() != Some(RETIRED))
                .filter(|s| s.lock_time.abs_diff(view.record.lock_time) < LOCK_TIME_TOLERANCE_SECS)
                .collect();

            if within.len() == 1 {
                prop_assert_eq!(view.link_kind(), Some(LinkKind::LockTime));
                prop_assert_eq!(view.linked_record(), Some(within[0]));
            } else {
                prop_assert!(view.link.is_none());
            }
        }
    }

    /// Retired chains never appear, on either side, and the surviving
    /// primaries keep their input order.
    #[test]
    fn retired_chains_are_excluded(primary in primaries(), secondary in secondaries()) {
        let reconciler = Reconciler::new(RetiredChains::new([RETIRED]));
        let views = reconciler.merge(&primary, &secondary, Phase::Signed);

        let expected: Vec<&str> = primary
            .iter()
            .filter(|p| p.chain_id() != Some(RETIRED))
            .map(|p| p.address.as_str())
            .collect();
        let actual: Vec<&str> = views.iter().map(|v| v.record.address.as_str()).collect();
        prop_assert_eq!(actual, expected);

        for view in &views {
            if let Some(linked) = view.linked_record() {
                prop_assert_ne!(linked.chain_id(), Some(RETIRED));
            }
            prop_assert_eq!(view.phase, Phase::Signed);
        }
    }
}

// ── Exposition Properties ───────────────────────────────────

fn samples() -> impl Strategy<Value = Vec<MetricSample>> {
    let name = prop_oneof![
        "[a-c]{1,2}",
        ("[a-c]{1,2}", "[x-z]{1,2}").prop_map(|(base, label)| format!("{base}{{l=\"{label}\"}}")),
    ];
    prop::collection::vec((name, -1_000i32..1_000), 0..24).prop_map(|items| {
        items
            .into_iter()
            .map(|(name, value)| MetricSample::new(name, f64::from(value)))
            .collect()
    })
}

proptest! {
    /// Each base name gets exactly one `# TYPE` line, directly followed
    /// by all of its samples.
    #[test]
    fn type_lines_group_each_base_once(samples in samples()) {
        let text = format(&samples);
        let lines: Vec<&str> = text.lines().collect();

        let mut seen = std::collections::BTreeSet::new();
        let mut current: Option<&str> = None;
        let mut sample_lines = 0;

        for line in &lines {
            if let Some(rest) = line.strip_prefix("# TYPE ") {
                let base = rest.strip_suffix(" gauge").unwrap_or(rest);
                prop_assert!(seen.insert(base.to_string()), "duplicate TYPE for {}", base);
                current = Some(base);
            } else {
                let name = line.rsplit_once(' ').map_or(*line, |(name, _)| name);
                prop_assert_eq!(Some(base_name(name)), current);
                sample_lines += 1;
            }
        }

        prop_assert_eq!(sample_lines, samples.len());
    }

    /// Output depends only on the multiset of samples.
    #[test]
    fn format_ignores_input_order(samples in samples(), rotation in 0usize..24) {
        let mut reversed = samples.clone();
        reversed.reverse();

        let mut rotated = samples.clone();
        if !rotated.is_empty() {
            let by = rotation % rotated.len();
            rotated.rotate_left(by);
        }

        let expected = format(&samples);
        prop_assert_eq!(format(&reversed), expected.clone());
        prop_assert_eq!(format(&rotated), expected.clone());
        prop_assert_eq!(format(&samples), expected);
    }
}
