//! Archethic HTLC Collector
//!
//! Implements the `HtlcCollector` port for the Archethic bridge pools.
//! Discovery asks each pool for its HTLC lists; each HTLC is then read
//! through its `info` function. Withdrawn and refunded HTLCs never
//! change again, so their records are served from the snapshot store.
//!
//! A pool's cached lists are read, merged and written back under that
//! pool's discovery lock, so overlapping ticks and board builds never
//! overwrite each other's discoveries.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::domain::htlc::{HtlcRecord, HtlcStatus, Phase, SourceChain};
use crate::domain::metric::MetricSample;
use crate::domain::stats::htlc_samples;
use crate::ports::collector::{ChainFamily, ChainSnapshot, HtlcCollector, PhaseRecords};
use crate::ports::store::{SnapshotStore, get_json, put_json};

use super::client::ArchethicClient;

/// Token locked by Archethic HTLCs unless `info` names another one.
const NATIVE_TOKEN: &str = "UCO";

/// HTLC lists returned by a pool's `get_htlcs` function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHtlcs {
    #[serde(default)]
    pub chargeable: Vec<String>,
    #[serde(default)]
    pub signed: Vec<String>,
}

impl PoolHtlcs {
    pub fn of(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::Chargeable => &self.chargeable,
            Phase::Signed => &self.signed,
        }
    }

    /// Add addresses from `other` that are not known yet, keeping order.
    pub fn absorb(&mut self, other: Self) -> usize {
        let mut added = 0;
        for (known, fresh) in [
            (&mut self.chargeable, other.chargeable),
            (&mut self.signed, other.signed),
        ] {
            for address in fresh {
                if !known.iter().any(|a| a.eq_ignore_ascii_case(&address)) {
                    known.push(address);
                    added += 1;
                }
            }
        }
        added
    }
}

/// Payload of an HTLC contract's `info` function.
#[derive(Debug, Clone, Deserialize)]
pub struct HtlcInfo {
    pub end_time: u64,
    pub amount: Decimal,
    pub status: u64,
    #[serde(default)]
    pub user_address: Option<String>,
    #[serde(default)]
    pub secret_hash: Option<String>,
    #[serde(default)]
    pub evm_contract: Option<String>,
    #[serde(default)]
    pub evm_chain_id: Option<u64>,
    #[serde(default)]
    pub token: Option<String>,
}

impl HtlcInfo {
    /// Normalize into a record observed in `phase`.
    pub fn into_record(self, address: &str, phase: Phase) -> Result<HtlcRecord> {
        let Some(status) = HtlcStatus::from_code(self.status) else {
            bail!("HTLC {address} reports unknown status {}", self.status);
        };

        Ok(HtlcRecord {
            source: SourceChain::Archethic,
            phase,
            address: address.to_string(),
            lock_time: self.end_time,
            counterparty_contract: self.evm_contract.filter(|c| !c.is_empty()),
            counterparty_chain_id: self.evm_chain_id,
            status,
            amount: self.amount,
            token: self.token.unwrap_or_else(|| NATIVE_TOKEN.to_string()),
            user_address: self.user_address,
            secret_hash: self.secret_hash,
            creation_time: None,
        })
    }
}

fn pool_key(pool: &str) -> String {
    format!("archethic:htlcs:{pool}")
}

fn htlc_key(address: &str) -> String {
    format!("archethic:htlc:{address}")
}

/// Collector over the configured Archethic pools.
pub struct ArchethicCollector {
    client: Arc<ArchethicClient>,
    store: Arc<dyn SnapshotStore>,
    pools: Vec<String>,
    discovery: HashMap<String, Mutex<()>>,
}

impl ArchethicCollector {
    pub fn new(client: Arc<ArchethicClient>, store: Arc<dyn SnapshotStore>, pools: Vec<String>) -> Self {
        let discovery = pools.iter().map(|pool| (pool.clone(), Mutex::new(()))).collect();
        Self {
            client,
            store,
            pools,
            discovery,
        }
    }

    /// Fetch a pool's HTLC lists, merge them into the cached lists and
    /// return the merged result.
    #[instrument(skip(self))]
    async fn discover(&self, pool: &str) -> Result<PoolHtlcs> {
        let _guard = match self.discovery.get(pool) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let key = pool_key(pool);
        let mut known: PoolHtlcs = get_json(self.store.as_ref(), &key).await?.unwrap_or_default();

        let result = self
            .client
            .call_function(pool, "get_htlcs", Vec::new())
            .await
            .with_context(|| format!("get_htlcs failed for pool {pool}"))?;
        let fresh: PoolHtlcs =
            serde_json::from_value(result).with_context(|| format!("Malformed get_htlcs result for pool {pool}"))?;

        let added = known.absorb(fresh);
        if added > 0 {
            put_json(self.store.as_ref(), &key, &known).await?;
            debug!(pool, added, "New Archethic HTLCs discovered");
        }

        Ok(known)
    }

    /// Record for one HTLC, from the store when terminal.
    async fn load_record(&self, address: &str, phase: Phase) -> Result<HtlcRecord> {
        let key = htlc_key(address);
        if let Some(cached) = get_json::<HtlcRecord>(self.store.as_ref(), &key).await? {
            return Ok(cached);
        }

        let result = self
            .client
            .call_function(address, "info", Vec::new())
            .await
            .with_context(|| format!("info failed for HTLC {address}"))?;
        let info: HtlcInfo =
            serde_json::from_value(result).with_context(|| format!("Malformed info result for HTLC {address}"))?;
        let record = info.into_record(address, phase)?;

        if record.status.is_terminal() {
            put_json(self.store.as_ref(), &key, &record).await?;
        }

        Ok(record)
    }

    async fn records_of(&self, lists: &[PoolHtlcs], phase: Phase) -> Result<Vec<HtlcRecord>> {
        let addresses = lists.iter().flat_map(|l| l.of(phase));
        try_join_all(addresses.map(|address| self.load_record(address, phase))).await
    }

    async fn discover_all(&self) -> Result<Vec<PoolHtlcs>> {
        try_join_all(self.pools.iter().map(|pool| self.discover(pool))).await
    }

    async fn pool_balances(&self) -> Result<Vec<MetricSample>> {
        let balances = try_join_all(self.pools.iter().map(|pool| async move {
            let balance = self
                .client
                .uco_balance(pool)
                .await
                .with_context(|| format!("Balance query failed for pool {pool}"))?;
            Ok::<_, anyhow::Error>(MetricSample::labeled(
                "archethic_pool_balance",
                &[("pool", pool.as_str())],
                balance.to_f64().unwrap_or(0.0),
            ))
        }))
        .await?;
        Ok(balances)
    }
}

#[async_trait]
impl HtlcCollector for ArchethicCollector {
    fn family(&self) -> ChainFamily {
        ChainFamily::Archethic
    }

    #[instrument(skip(self))]
    async fn fetch_records(&self, phase: Phase) -> Result<Vec<HtlcRecord>> {
        let lists = self.discover_all().await?;
        self.records_of(&lists, phase).await
    }

    #[instrument(skip(self))]
    async fn fetch_phases(&self) -> Result<PhaseRecords> {
        let lists = self.discover_all().await?;
        let (chargeable, signed) = tokio::try_join!(
            self.records_of(&lists, Phase::Chargeable),
            self.records_of(&lists, Phase::Signed),
        )?;
        Ok(PhaseRecords { chargeable, signed })
    }

    #[instrument(skip(self))]
    async fn poll_snapshot(&self) -> Result<ChainSnapshot> {
        let lists = self.discover_all().await?;
        let (chargeable, signed, balances) = tokio::try_join!(
            self.records_of(&lists, Phase::Chargeable),
            self.records_of(&lists, Phase::Signed),
            self.pool_balances(),
        )?;

        let mut records = chargeable;
        records.extend(signed);

        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut samples = htlc_samples("archethic", &[], &records, now);
        samples.extend(balances);

        info!(
            pools = self.pools.len(),
            records = records.len(),
            samples = samples.len(),
            "Archethic snapshot collected"
        );

        Ok(ChainSnapshot {
            family: ChainFamily::Archethic,
            samples,
            records,
        })
    }

    async fn is_healthy(&self) -> bool {
        self.client.health_check().await
    }
}
