//! EVM RPC Provider - alloy-rs 0.9 Connection Management
//!
//! One provider per configured chain. The chain id reported by the RPC
//! endpoint is checked against the configured one at connect, so a
//! misrouted URL fails at startup instead of producing foreign data.
//!
//! Stored as a type-erased `dyn Provider` over the boxed transport to
//! keep alloy's filler types out of the adapter API.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::EvmChainConfig;

/// RPC connection to one EVM chain.
pub struct EvmProvider {
    /// The alloy provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
    /// Chain id, validated at connect.
    chain_id: u64,
    /// Human-readable chain name for logs.
    name: String,
}

impl EvmProvider {
    /// Connect to the chain's RPC endpoint and validate its chain id.
    #[instrument(skip_all, fields(chain = %config.name))]
    pub async fn connect(config: &EvmChainConfig) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .on_builtin(&config.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to {} RPC", config.name))?;

        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if chain_id != config.chain_id {
            anyhow::bail!(
                "Expected {} (chain_id={}), got {chain_id}",
                config.name,
                config.chain_id
            );
        }

        info!(chain_id, "Connected to EVM RPC");

        Ok(Self {
            provider,
            chain_id,
            name: config.name.clone(),
        })
    }

    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest block number.
    pub async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .with_context(|| format!("eth_blockNumber failed on {}", self.name))
    }

    /// Native balance of `address`, in wei.
    pub async fn balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address)
            .await
            .with_context(|| format!("eth_getBalance failed for {address} on {}", self.name))
    }

    /// Read-only contract call.
    pub async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        self.provider
            .call(&TransactionRequest::default().to(to).input(calldata.into()))
            .await
            .with_context(|| format!("eth_call to {to} failed on {}", self.name))
    }

    /// Logs matching `filter`.
    pub async fn logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.provider
            .get_logs(filter)
            .await
            .with_context(|| format!("eth_getLogs failed on {}", self.name))
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
