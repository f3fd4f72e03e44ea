//! EVM HTLC Collector
//!
//! Implements the `HtlcCollector` port over every configured EVM chain.
//! HTLCs are discovered from pool logs, scanned in bounded block
//! windows from a persisted cursor, and read through their getters.
//! Chains are polled concurrently; one failing chain fails the poll.
//!
//! Each pool's list and cursor are read, extended and written under that
//! pool's discovery lock. Without it, a caller with an older head could
//! store its shorter list after another caller advanced the cursor, and
//! the HTLCs in between would never be scanned again.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::Filter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::{join_all, try_join_all};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument};

use crate::config::{EvmChainConfig, EvmPoolConfig};
use crate::domain::htlc::{HtlcRecord, Phase, SourceChain};
use crate::domain::metric::MetricSample;
use crate::domain::stats::htlc_samples;
use crate::ports::collector::{ChainFamily, ChainSnapshot, HtlcCollector, PhaseRecords};
use crate::ports::store::{SnapshotStore, get_json, put_json};

use super::contracts::{
    self, AMOUNT_FN, LOCK_TIME_FN, NATIVE_DECIMALS, STATUS_FN, discovery_topics, htlc_from_log,
};
use super::provider::EvmProvider;

/// Concurrent `eth_call`s per chain.
const MAX_INFLIGHT_CALLS: usize = 16;

/// An HTLC announced by a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredHtlc {
    pub address: Address,
    pub phase: Phase,
}

/// A bridge pool with its parsed address.
#[derive(Debug, Clone)]
pub struct EvmPool {
    pub address: Address,
    pub token: String,
    pub decimals: u32,
    pub deploy_block: u64,
}

impl EvmPool {
    pub fn from_config(config: &EvmPoolConfig) -> Result<Self> {
        Ok(Self {
            address: config
                .address
                .parse()
                .with_context(|| format!("Invalid pool address {}", config.address))?,
            token: config.token.clone(),
            decimals: config.decimals,
            deploy_block: config.deploy_block,
        })
    }
}

/// Inclusive block windows covering `from..=to`, at most `range` wide.
pub fn block_windows(from: u64, to: u64, range: u64) -> Vec<(u64, u64)> {
    let range = range.max(1);
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(range - 1).min(to);
        windows.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    windows
}

/// Collector for the pools of one chain.
pub struct ChainCollector {
    provider: Arc<EvmProvider>,
    store: Arc<dyn SnapshotStore>,
    pools: Vec<EvmPool>,
    block_range: u64,
    calls: Semaphore,
    discovery: HashMap<Address, Mutex<()>>,
}

impl ChainCollector {
    pub fn new(
        provider: Arc<EvmProvider>,
        store: Arc<dyn SnapshotStore>,
        config: &EvmChainConfig,
    ) -> Result<Self> {
        let pools: Vec<EvmPool> = config.pools.iter().map(EvmPool::from_config).collect::<Result<_>>()?;
        let discovery = pools.iter().map(|pool| (pool.address, Mutex::new(()))).collect();
        Ok(Self {
            provider,
            store,
            pools,
            block_range: config.block_range,
            calls: Semaphore::new(MAX_INFLIGHT_CALLS),
            discovery,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.provider.chain_id()
    }

    fn cursor_key(&self, pool: &EvmPool) -> String {
        format!("evm:{}:cursor:{:#x}", self.chain_id(), pool.address)
    }

    fn htlcs_key(&self, pool: &EvmPool) -> String {
        format!("evm:{}:htlcs:{:#x}", self.chain_id(), pool.address)
    }

    fn htlc_key(&self, htlc: Address) -> String {
        format!("evm:{}:htlc:{htlc:#x}", self.chain_id())
    }

    /// Scan new pool logs up to `head` and return every known HTLC.
    ///
    /// The list is saved before the cursor, window by window, so a
    /// crash mid-scan re-reads at most one window.
    #[instrument(skip(self, pool), fields(chain_id = self.chain_id(), pool = %pool.address))]
    async fn discover(&self, pool: &EvmPool, head: u64) -> Result<Vec<DiscoveredHtlc>> {
        let _guard = match self.discovery.get(&pool.address) {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let store = self.store.as_ref();
        let cursor_key = self.cursor_key(pool);
        let htlcs_key = self.htlcs_key(pool);

        let mut known: Vec<DiscoveredHtlc> = get_json(store, &htlcs_key).await?.unwrap_or_default();
        let start = match get_json::<u64>(store, &cursor_key).await? {
            Some(scanned) => scanned + 1,
            None => pool.deploy_block,
        };

        for (from, to) in block_windows(start, head, self.block_range) {
            let filter = Filter::new()
                .address(pool.address)
                .event_signature(discovery_topics())
                .from_block(from)
                .to_block(to);
            let logs = self.provider.logs(&filter).await?;

            let mut added = 0;
            for (address, phase) in logs.iter().filter_map(htlc_from_log) {
                if !known.iter().any(|h| h.address == address) {
                    known.push(DiscoveredHtlc { address, phase });
                    added += 1;
                }
            }

            if added > 0 {
                put_json(store, &htlcs_key, &known).await?;
                debug!(from, to, added, "New EVM HTLCs discovered");
            }
            put_json(store, &cursor_key, &to).await?;
        }

        Ok(known)
    }

    async fn call(&self, htlc: Address, signature: &str) -> Result<alloy::primitives::Bytes> {
        let _permit = self.calls.acquire().await.context("Call limiter closed")?;
        self.provider.call(htlc, contracts::calldata(signature)).await
    }

    /// Record for one HTLC, from the store when terminal.
    async fn load_record(&self, pool: &EvmPool, htlc: &DiscoveredHtlc) -> Result<HtlcRecord> {
        let key = self.htlc_key(htlc.address);
        if let Some(cached) = get_json::<HtlcRecord>(self.store.as_ref(), &key).await? {
            return Ok(cached);
        }

        let (lock_time, status, amount) = tokio::try_join!(
            self.call(htlc.address, LOCK_TIME_FN),
            self.call(htlc.address, STATUS_FN),
            self.call(htlc.address, AMOUNT_FN),
        )?;

        let record = HtlcRecord {
            source: SourceChain::Evm {
                chain_id: self.chain_id(),
            },
            phase: htlc.phase,
            address: htlc.address.to_string(),
            lock_time: contracts::decode_timestamp(&lock_time)
                .with_context(|| format!("Bad lockTime from {}", htlc.address))?,
            counterparty_contract: None,
            counterparty_chain_id: None,
            status: contracts::decode_status(&status)
                .with_context(|| format!("Bad status from {}", htlc.address))?,
            amount: contracts::to_decimal(contracts::decode_word(&amount)?, pool.decimals)
                .with_context(|| format!("Bad amount from {}", htlc.address))?,
            token: pool.token.clone(),
            user_address: None,
            secret_hash: None,
            creation_time: None,
        };

        if record.status.is_terminal() {
            put_json(self.store.as_ref(), &key, &record).await?;
        }

        Ok(record)
    }

    /// Records of every pool, optionally restricted to one phase.
    async fn records(&self, head: u64, phase: Option<Phase>) -> Result<Vec<HtlcRecord>> {
        let discovered = try_join_all(self.pools.iter().map(|pool| self.discover(pool, head))).await?;

        let loads = self
            .pools
            .iter()
            .zip(&discovered)
            .flat_map(|(pool, htlcs)| htlcs.iter().map(move |h| (pool, h)))
            .filter(|(_, h)| phase.is_none_or(|p| h.phase == p))
            .map(|(pool, h)| self.load_record(pool, h));

        try_join_all(loads).await
    }

    async fn fetch_records(&self, phase: Phase) -> Result<Vec<HtlcRecord>> {
        let head = self.provider.block_number().await?;
        self.records(head, Some(phase)).await
    }

    async fn fetch_phases(&self) -> Result<PhaseRecords> {
        let head = self.provider.block_number().await?;
        let (chargeable, signed): (Vec<_>, Vec<_>) = self
            .records(head, None)
            .await?
            .into_iter()
            .partition(|r| r.phase == Phase::Chargeable);
        Ok(PhaseRecords { chargeable, signed })
    }

    #[instrument(skip(self), fields(chain_id = self.chain_id()))]
    async fn snapshot(&self) -> Result<(Vec<MetricSample>, Vec<HtlcRecord>)> {
        let head = self.provider.block_number().await?;
        let records = self.records(head, None).await?;

        let chain_id = self.chain_id().to_string();
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut samples = htlc_samples("evm", &[("chain_id", &chain_id)], &records, now);

        for pool in &self.pools {
            let balance = self.provider.balance(pool.address).await?;
            let balance = contracts::to_decimal(balance, NATIVE_DECIMALS)?;
            samples.push(MetricSample::labeled(
                "evm_pool_balance",
                &[("chain_id", &chain_id), ("pool", &pool.address.to_string())],
                balance.to_f64().unwrap_or(0.0),
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        samples.push(MetricSample::labeled(
            "evm_block_number",
            &[("chain_id", &chain_id)],
            head as f64,
        ));

        info!(
            chain = self.provider.name(),
            head,
            records = records.len(),
            "EVM chain snapshot collected"
        );

        Ok((samples, records))
    }
}

/// Collector over all configured EVM chains.
pub struct EvmCollector {
    chains: Vec<ChainCollector>,
}

impl EvmCollector {
    pub const fn new(chains: Vec<ChainCollector>) -> Self {
        Self { chains }
    }

    /// Connect every configured chain.
    pub async fn connect(configs: &[EvmChainConfig], store: &Arc<dyn SnapshotStore>) -> Result<Self> {
        let mut chains = Vec::with_capacity(configs.len());
        for config in configs {
            let provider = Arc::new(EvmProvider::connect(config).await?);
            chains.push(ChainCollector::new(provider, Arc::clone(store), config)?);
        }
        Ok(Self::new(chains))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.chains.iter().map(ChainCollector::chain_id).collect()
    }
}

#[async_trait]
impl HtlcCollector for EvmCollector {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    #[instrument(skip(self))]
    async fn fetch_records(&self, phase: Phase) -> Result<Vec<HtlcRecord>> {
        let results = join_all(self.chains.iter().map(|chain| async move {
            chain
                .fetch_records(phase)
                .await
                .with_context(|| format!("EVM chain {} failed", chain.chain_id()))
        }))
        .await;

        let mut records = Vec::new();
        for result in results {
            records.extend(result?);
        }
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn fetch_phases(&self) -> Result<PhaseRecords> {
        let results = join_all(self.chains.iter().map(|chain| async move {
            chain
                .fetch_phases()
                .await
                .with_context(|| format!("EVM chain {} failed", chain.chain_id()))
        }))
        .await;

        let mut phases = PhaseRecords::default();
        for result in results {
            let chain = result?;
            phases.chargeable.extend(chain.chargeable);
            phases.signed.extend(chain.signed);
        }
        Ok(phases)
    }

    #[instrument(skip(self))]
    async fn poll_snapshot(&self) -> Result<ChainSnapshot> {
        let results = join_all(self.chains.iter().map(|chain| async move {
            chain
                .snapshot()
                .await
                .with_context(|| format!("EVM chain {} failed", chain.chain_id()))
        }))
        .await;

        let mut snapshot = ChainSnapshot::empty(ChainFamily::Evm);
        for result in results {
            let (samples, records) = result?;
            snapshot.samples.extend(samples);
            snapshot.records.extend(records);
        }
        Ok(snapshot)
    }

    async fn is_healthy(&self) -> bool {
        join_all(self.chains.iter().map(|c| c.provider.is_healthy()))
            .await
            .into_iter()
            .all(|healthy| healthy)
    }
}
