//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for the deployment-specific values
//! (port, schedule, storage folder, Archethic endpoint).
//! Pool addresses and chain endpoints live here - nothing is hardcoded
//! in the domain layer.

pub mod loader;

use serde::Deserialize;

use crate::domain::reconcile::MUMBAI_CHAIN_ID;

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and HTTP listener.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Poll schedule.
  #[serde(default)]
  pub schedule: ScheduleConfig,
  /// Snapshot store location.
  #[serde(default)]
  pub storage: StorageConfig,
  /// Archethic endpoint and pools.
  pub archethic: ArchethicConfig,
  /// EVM chains and pools.
  #[serde(default)]
  pub evm: EvmConfig,
  /// Swap reconciliation settings.
  #[serde(default)]
  pub reconciliation: ReconciliationConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Bind host of the HTTP server.
  #[serde(default = "default_host")]
  pub host: String,
  /// HTTP port serving /metrics, /htlcs and health probes.
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      host: default_host(),
      port: default_port(),
    }
  }
}

/// Poll schedule configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
  /// Cron expression (5-field crontab, or 6/7 fields with seconds).
  #[serde(default = "default_cron")]
  pub cron: String,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self { cron: default_cron() }
  }
}

/// Snapshot store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Directory holding the JSON snapshot files.
  #[serde(default = "default_db_folder")]
  pub db_folder: String,

  /// Keep snapshots in memory only (dry runs); `db_folder` is ignored.
  #[serde(default)]
  pub ephemeral: bool,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      db_folder: default_db_folder(),
      ephemeral: false,
    }
  }
}

/// Archethic endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchethicConfig {
  /// Node base URL (JSON-RPC at `/api/rpc`, GraphQL at `/api`).
  pub endpoint: String,
  /// Bridge pool contract addresses.
  #[serde(default)]
  pub pools: Vec<String>,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Upper bound on requests per second to the node.
  #[serde(default = "default_max_rps")]
  pub max_requests_per_second: u32,
  /// Maximum in-flight requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

/// EVM chains configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvmConfig {
  /// Monitored chains.
  #[serde(default)]
  pub chains: Vec<EvmChainConfig>,
}

/// One monitored EVM chain.
#[derive(Debug, Clone, Deserialize)]
pub struct EvmChainConfig {
  /// Human-readable chain name.
  pub name: String,
  /// Expected EIP-155 chain id, validated at connect.
  pub chain_id: u64,
  /// JSON-RPC endpoint.
  pub rpc_url: String,
  /// Maximum block span of one `eth_getLogs` query.
  #[serde(default = "default_block_range")]
  pub block_range: u64,
  /// Bridge pools on this chain.
  #[serde(default)]
  pub pools: Vec<EvmPoolConfig>,
}

/// One bridge pool contract on an EVM chain.
#[derive(Debug, Clone, Deserialize)]
pub struct EvmPoolConfig {
  /// Pool contract address.
  pub address: String,
  /// Token symbol locked by the pool's HTLCs.
  pub token: String,
  /// Token decimals used to scale raw amounts.
  #[serde(default = "default_decimals")]
  pub decimals: u32,
  /// Block the pool was deployed at (log scan start).
  #[serde(default)]
  pub deploy_block: u64,
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
  /// Chains whose HTLCs are excluded from the swap board.
  #[serde(default = "default_retired_chains")]
  pub retired_chain_ids: Vec<u64>,
}

impl Default for ReconciliationConfig {
  fn default() -> Self {
    Self {
      retired_chain_ids: default_retired_chains(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "htlc-monitor".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
  3000
}

fn default_cron() -> String {
  "*/1 * * * *".to_string()
}

fn default_db_folder() -> String {
  "data".to_string()
}

const fn default_timeout() -> u64 {
  30
}

const fn default_max_rps() -> u32 {
  20
}

const fn default_max_concurrent() -> usize {
  8
}

const fn default_max_retries() -> u32 {
  3
}

const fn default_block_range() -> u64 {
  5_000
}

const fn default_decimals() -> u32 {
  18
}

fn default_retired_chains() -> Vec<u64> {
  vec![MUMBAI_CHAIN_ID]
}
