//! Cross-chain HTLC reconciliation.
//!
//! An Archethic HTLC and its EVM counterpart share no identifier. The
//! Archethic side sometimes records the EVM contract address; when it
//! does, that address is the link. Otherwise the two contracts are
//! correlated by expiry: the bridge creates both with the same lock
//! time, so a single EVM contract expiring within the tolerance window
//! is taken as the counterpart. Ambiguous windows stay unlinked.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::htlc::{HtlcRecord, Phase};

/// Lock times closer than this (strictly) are considered the same swap.
pub const LOCK_TIME_TOLERANCE_SECS: u64 = 2;

/// Polygon Mumbai, shut down and no longer monitored.
pub const MUMBAI_CHAIN_ID: u64 = 80_001;

/// Chain ids whose HTLCs are dropped before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredChains(BTreeSet<u64>);

impl RetiredChains {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// No exclusions.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.0.contains(&chain_id)
    }

    /// Whether a record lives on (or bridges to) a retired chain.
    pub fn excludes(&self, record: &HtlcRecord) -> bool {
        record.chain_id().is_some_and(|id| self.contains(id))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RetiredChains {
    fn default() -> Self {
        Self::new([MUMBAI_CHAIN_ID])
    }
}

/// How a counterpart was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// The primary named the counterpart contract address.
    Explicit,
    /// The only secondary whose lock time fell inside the tolerance.
    LockTime,
}

/// Counterpart attached to a primary record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub kind: LinkKind,
    pub record: HtlcRecord,
}

/// One Archethic HTLC with its best-effort EVM counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapView {
    /// Phase of the request that produced this view.
    pub phase: Phase,
    /// The Archethic-side record.
    pub record: HtlcRecord,
    /// The matched EVM-side record, if any.
    pub link: Option<Link>,
}

impl SwapView {
    pub fn linked_record(&self) -> Option<&HtlcRecord> {
        self.link.as_ref().map(|l| &l.record)
    }

    pub fn link_kind(&self) -> Option<LinkKind> {
        self.link.as_ref().map(|l| l.kind)
    }
}

/// Counts of views by link outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub explicit: usize,
    pub lock_time: usize,
    pub unlinked: usize,
}

impl MergeSummary {
    pub fn of(views: &[SwapView]) -> Self {
        views.iter().fold(Self::default(), |mut acc, v| {
            match v.link_kind() {
                Some(LinkKind::Explicit) => acc.explicit += 1,
                Some(LinkKind::LockTime) => acc.lock_time += 1,
                None => acc.unlinked += 1,
            }
            acc
        })
    }

    pub const fn total(&self) -> usize {
        self.explicit + self.lock_time + self.unlinked
    }
}

/// Merges Archethic (primary) and EVM (secondary) HTLC records.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    retired: RetiredChains,
}

impl Reconciler {
    pub const fn new(retired: RetiredChains) -> Self {
        Self { retired }
    }

    pub const fn retired(&self) -> &RetiredChains {
        &self.retired
    }

    /// Build one view per non-retired primary record, in input order.
    pub fn merge(
        &self,
        primary: &[HtlcRecord],
        secondary: &[HtlcRecord],
        phase: Phase,
    ) -> Vec<SwapView> {
        let candidates: Vec<&HtlcRecord> = secondary
            .iter()
            .filter(|r| !self.retired.excludes(r))
            .collect();

        primary
            .iter()
            .filter(|r| !self.retired.excludes(r))
            .map(|record| SwapView {
                phase,
                record: record.clone(),
                link: find_link(record, &candidates),
            })
            .collect()
    }
}

fn find_link(primary: &HtlcRecord, candidates: &[&HtlcRecord]) -> Option<Link> {
    let reference = primary
        .counterparty_contract
        .as_deref()
        .filter(|r| !r.is_empty());
    if let Some(reference) = reference {
        // A named counterpart is authoritative: no lock-time fallback.
        return candidates
            .iter()
            .find(|c| c.address.eq_ignore_ascii_case(reference))
            .map(|c| Link {
                kind: LinkKind::Explicit,
                record: (*c).clone(),
            });
    }

    let mut within = candidates
        .iter()
        .filter(|c| c.lock_time.abs_diff(primary.lock_time) < LOCK_TIME_TOLERANCE_SECS);

    match (within.next(), within.next()) {
        (Some(only), None) => Some(Link {
            kind: LinkKind::LockTime,
            record: (*only).clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::htlc::{HtlcStatus, SourceChain};
    use rust_decimal::Decimal;

    fn archethic(lock_time: u64, reference: Option<&str>) -> HtlcRecord {
        HtlcRecord {
            source: SourceChain::Archethic,
            phase: Phase::Chargeable,
            address: format!("0000{lock_time:060x}"),
            lock_time,
            counterparty_contract: reference.map(str::to_string),
            counterparty_chain_id: Some(137),
            status: HtlcStatus::Pending,
            amount: Decimal::ONE,
            token: "UCO".to_string(),
            user_address: None,
            secret_hash: None,
            creation_time: None,
        }
    }

    fn evm(address: &str, lock_time: u64) -> HtlcRecord {
        HtlcRecord {
            source: SourceChain::Evm { chain_id: 137 },
            phase: Phase::Chargeable,
            address: address.to_string(),
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

    #[test]
    fn test_explicit_reference_wins_over_timing() {
        let primary = [archethic(1000, Some("0xAAA"))];
        let secondary = [evm("0xaaa", 1), evm("0xbbb", 2)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].link_kind(), Some(LinkKind::Explicit));
        assert_eq!(views[0].linked_record().unwrap().address, "0xaaa");
    }

    #[test]
    fn test_explicit_reference_missing_does_not_fall_back() {
        let primary = [archethic(1000, Some("0xdead"))];
        let secondary = [evm("0xccc", 1000)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Signed);

        assert!(views[0].link.is_none());
    }

    #[test]
    fn test_empty_reference_uses_lock_time() {
        let primary = [archethic(1000, Some(""))];
        let secondary = [evm("0xccc", 999)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);

        assert_eq!(views[0].link_kind(), Some(LinkKind::LockTime));
        assert_eq!(views[0].linked_record().unwrap().address, "0xccc");
    }

    #[test]
    fn test_single_lock_time_candidate_links() {
        let primary = [archethic(1000, None)];
        let secondary = [evm("0xccc", 1001)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);

        assert_eq!(views[0].link_kind(), Some(LinkKind::LockTime));
        assert_eq!(views[0].linked_record().unwrap().address, "0xccc");
    }

    #[test]
    fn test_two_lock_time_candidates_stay_unlinked() {
        let primary = [archethic(1000, None)];
        let secondary = [evm("0x1", 999), evm("0x2", 1001)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);

        assert!(views[0].link.is_none());
    }

    #[test]
    fn test_tolerance_is_strict() {
        let primary = [archethic(1000, None)];
        let secondary = [evm("0x1", 1002)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);

        assert!(views[0].link.is_none());
    }

    #[test]
    fn test_retired_chain_primary_dropped() {
        let mut mumbai = archethic(1000, None);
        mumbai.counterparty_chain_id = Some(MUMBAI_CHAIN_ID);
        let primary = [mumbai, archethic(2000, None)];

        let views = Reconciler::default().merge(&primary, &[], Phase::Chargeable);

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].record.lock_time, 2000);
    }

    #[test]
    fn test_retired_chain_secondary_not_a_candidate() {
        let primary = [archethic(1000, None)];
        let mut mumbai = evm("0x1", 1000);
        mumbai.source = SourceChain::Evm {
            chain_id: MUMBAI_CHAIN_ID,
        };

        let views = Reconciler::default().merge(&primary, &[mumbai], Phase::Chargeable);

        assert!(views[0].link.is_none());
    }

    #[test]
    fn test_phase_stamped_and_order_kept() {
        let primary = [archethic(3, None), archethic(1, None), archethic(2, None)];

        let views = Reconciler::new(RetiredChains::none()).merge(&primary, &[], Phase::Signed);

        let order: Vec<u64> = views.iter().map(|v| v.record.lock_time).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(views.iter().all(|v| v.phase == Phase::Signed));
    }

    #[test]
    fn test_empty_inputs() {
        let r = Reconciler::default();
        assert!(r.merge(&[], &[evm("0x1", 1)], Phase::Chargeable).is_empty());

        let views = r.merge(&[archethic(1, None)], &[], Phase::Chargeable);
        assert_eq!(MergeSummary::of(&views).unlinked, 1);
    }

    #[test]
    fn test_merge_summary_counts() {
        let primary = [
            archethic(1000, Some("0xAAA")),
            archethic(5000, None),
            archethic(9000, None),
        ];
        let secondary = [evm("0xaaa", 1), evm("0xbbb", 5001)];

        let views = Reconciler::default().merge(&primary, &secondary, Phase::Chargeable);
        let summary = MergeSummary::of(&views);

        assert_eq!(summary.explicit, 1);
        assert_eq!(summary.lock_time, 1);
        assert_eq!(summary.unlinked, 1);
        assert_eq!(summary.total(), 3);
    }
}
