//! Derived HTLC counters for one chain snapshot.
//!
//! Every (phase, status) combination is emitted even when empty so that
//! series do not vanish between scrapes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::htlc::{HtlcRecord, HtlcStatus, Phase};
use super::metric::MetricSample;

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    count: u64,
    amount: Decimal,
}

/// Count, summed amount and expired-pending gauges for `records`.
///
/// Names are `<prefix>_htlc_count`, `<prefix>_htlc_amount` and
/// `<prefix>_htlc_expired_pending`; `scope` labels (e.g. `chain_id`)
/// precede `phase` and `status`.
pub fn htlc_samples(
    prefix: &str,
    scope: &[(&str, &str)],
    records: &[HtlcRecord],
    now_secs: u64,
) -> Vec<MetricSample> {
    let mut buckets: BTreeMap<(Phase, HtlcStatus), Bucket> = BTreeMap::new();
    let mut expired: BTreeMap<Phase, u64> = BTreeMap::new();

    for record in records {
        let bucket = buckets.entry((record.phase, record.status)).or_default();
        bucket.count += 1;
        bucket.amount += record.amount;

        if record.is_expired_pending(now_secs) {
            *expired.entry(record.phase).or_default() += 1;
        }
    }

    let count_name = format!("{prefix}_htlc_count");
    let amount_name = format!("{prefix}_htlc_amount");
    let expired_name = format!("{prefix}_htlc_expired_pending");

    let mut samples = Vec::with_capacity(Phase::ALL.len() * (HtlcStatus::ALL.len() * 2 + 1));

    for phase in Phase::ALL {
        for status in HtlcStatus::ALL {
            let bucket = buckets.get(&(phase, status)).copied().unwrap_or_default();
            let labels = with_scope(scope, &[("phase", phase.as_str()), ("status", status.as_str())]);

            #[allow(clippy::cast_precision_loss)]
            samples.push(MetricSample::labeled(&count_name, &labels, bucket.count as f64));
            samples.push(MetricSample::labeled(
                &amount_name,
                &labels,
                bucket.amount.to_f64().unwrap_or(0.0),
            ));
        }

        let labels = with_scope(scope, &[("phase", phase.as_str())]);
        #[allow(clippy::cast_precision_loss)]
        samples.push(MetricSample::labeled(
            &expired_name,
            &labels,
            expired.get(&phase).copied().unwrap_or(0) as f64,
        ));
    }

    samples
}

fn with_scope<'a>(scope: &[(&'a str, &'a str)], rest: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    scope.iter().chain(rest).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::htlc::SourceChain;
    use rust_decimal_macros::dec;

    fn record(phase: Phase, status: HtlcStatus, amount: Decimal, lock_time: u64) -> HtlcRecord {
        HtlcRecord {
            source: SourceChain::Evm { chain_id: 1 },
            phase,
            address: "0x1".to_string(),
            lock_time,
            counterparty_contract: None,
            counterparty_chain_id: None,
            status,
            amount,
            token: "ETH".to_string(),
            user_address: None,
            secret_hash: None,
            creation_time: None,
        }
    }

    fn value(samples: &[MetricSample], name: &str) -> f64 {
        samples
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
            .unwrap_or_else(|| panic!("missing sample {name}"))
    }

    #[test]
    fn test_counts_and_amounts() {
        let records = vec![
            record(Phase::Chargeable, HtlcStatus::Pending, dec!(1.5), 100),
            record(Phase::Chargeable, HtlcStatus::Pending, dec!(0.5), 10_000),
            record(Phase::Signed, HtlcStatus::Withdrawn, dec!(2), 100),
        ];

        let samples = htlc_samples("evm", &[("chain_id", "1")], &records, 1_000);

        assert_eq!(
            value(&samples, "evm_htlc_count{chain_id=\"1\",phase=\"chargeable\",status=\"pending\"}"),
            2.0
        );
        assert_eq!(
            value(&samples, "evm_htlc_amount{chain_id=\"1\",phase=\"chargeable\",status=\"pending\"}"),
            2.0
        );
        assert_eq!(
            value(&samples, "evm_htlc_count{chain_id=\"1\",phase=\"signed\",status=\"refunded\"}"),
            0.0
        );
        assert_eq!(
            value(&samples, "evm_htlc_expired_pending{chain_id=\"1\",phase=\"chargeable\"}"),
            1.0
        );
        assert_eq!(
            value(&samples, "evm_htlc_expired_pending{chain_id=\"1\",phase=\"signed\"}"),
            0.0
        );
    }

    #[test]
    fn test_all_series_emitted_for_empty_input() {
        let samples = htlc_samples("archethic", &[], &[], 0);
        assert_eq!(samples.len(), 2 * (3 * 2 + 1));
        assert!(samples.iter().all(|s| s.value == 0.0));
    }
}
