//! Configuration Loader - File Loading, Overrides and Validation
//!
//! Handles loading `config.toml`, applying `HTLC_MONITOR_*` environment
//! overrides, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::usecases::schedule::TickSchedule;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "HTLC_MONITOR_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Resolve the config file path from the environment.
pub fn config_path_from_env() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load, override and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - An environment override is malformed
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
  validate_config(&config)?;

  info!(
    port = config.service.port,
    cron = %config.schedule.cron,
    archethic_pools = config.archethic.pools.len(),
    evm_chains = config.evm.chains.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML content without overrides or validation.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Apply `HTLC_MONITOR_*` overrides read through `lookup`.
pub fn apply_env_overrides(
  config: &mut AppConfig,
  lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
  if let Some(port) = lookup("HTLC_MONITOR_PORT") {
    config.service.port = port
      .parse()
      .with_context(|| format!("HTLC_MONITOR_PORT is not a port: {port}"))?;
  }
  if let Some(cron) = lookup("HTLC_MONITOR_CRON") {
    config.schedule.cron = cron;
  }
  if let Some(folder) = lookup("HTLC_MONITOR_DB_FOLDER") {
    config.storage.db_folder = folder;
  }
  if let Some(endpoint) = lookup("HTLC_MONITOR_ARCHETHIC_ENDPOINT") {
    config.archethic.endpoint = endpoint;
  }
  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Parsable cron schedule
/// - Non-empty endpoints and storage folder
/// - Hex Archethic pool addresses, valid EVM pool addresses
/// - Unique EVM chain ids and sane block ranges / decimals
pub fn validate_config(config: &AppConfig) -> Result<()> {
  TickSchedule::parse(&config.schedule.cron).context("schedule.cron is invalid")?;

  anyhow::ensure!(
    config.storage.ephemeral || !config.storage.db_folder.trim().is_empty(),
    "storage.db_folder must not be empty unless storage.ephemeral is set"
  );

  // Archethic validation
  anyhow::ensure!(
    !config.archethic.endpoint.is_empty(),
    "Archethic endpoint must not be empty"
  );
  anyhow::ensure!(
    config.archethic.max_requests_per_second > 0,
    "archethic.max_requests_per_second must be positive"
  );
  anyhow::ensure!(
    config.archethic.max_concurrent > 0,
    "archethic.max_concurrent must be positive"
  );
  for pool in &config.archethic.pools {
    anyhow::ensure!(
      !pool.is_empty() && pool.len() % 2 == 0 && pool.chars().all(|c| c.is_ascii_hexdigit()),
      "Archethic pool address is not hex: {pool}"
    );
  }

  // EVM validation
  let mut chain_ids = HashSet::new();
  for chain in &config.evm.chains {
    anyhow::ensure!(
      chain_ids.insert(chain.chain_id),
      "EVM chain id {} is configured twice",
      chain.chain_id
    );
    anyhow::ensure!(
      !chain.rpc_url.is_empty(),
      "EVM chain {} has an empty rpc_url",
      chain.name
    );
    anyhow::ensure!(
      chain.block_range > 0,
      "EVM chain {} block_range must be positive",
      chain.name
    );
    for pool in &chain.pools {
      pool
        .address
        .parse::<Address>()
        .with_context(|| format!("EVM chain {} pool address is invalid: {}", chain.name, pool.address))?;
      anyhow::ensure!(
        pool.decimals <= 28,
        "EVM chain {} pool {} decimals must be <= 28, got {}",
        chain.name,
        pool.address,
        pool.decimals
      );
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"
[service]
port = 4000

[archethic]
endpoint = "https://testnet.archethic.net"
pools = ["0000abcdef"]

[[evm.chains]]
name = "sepolia"
chain_id = 11155111
rpc_url = "https://rpc.sepolia.org"

[[evm.chains.pools]]
address = "0x0000000000000000000000000000000000000001"
token = "ETH"
deploy_block = 100
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_sample_with_defaults() {
    let config = parse_config(SAMPLE).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.service.port, 4000);
    assert_eq!(config.service.host, "0.0.0.0");
    assert_eq!(config.schedule.cron, "*/1 * * * *");
    assert_eq!(config.storage.db_folder, "data");
    assert_eq!(config.reconciliation.retired_chain_ids, vec![80_001]);
    assert_eq!(config.evm.chains[0].block_range, 5_000);
    assert_eq!(config.evm.chains[0].pools[0].decimals, 18);
    assert_eq!(config.evm.chains[0].pools[0].deploy_block, 100);
  }

  #[test]
  fn test_env_overrides() {
    let mut config = parse_config(SAMPLE).unwrap();
    apply_env_overrides(&mut config, |key| match key {
      "HTLC_MONITOR_PORT" => Some("9100".to_string()),
      "HTLC_MONITOR_CRON" => Some("*/30 * * * * *".to_string()),
      "HTLC_MONITOR_DB_FOLDER" => Some("/var/lib/htlc".to_string()),
      _ => None,
    })
    .unwrap();

    assert_eq!(config.service.port, 9100);
    assert_eq!(config.schedule.cron, "*/30 * * * * *");
    assert_eq!(config.storage.db_folder, "/var/lib/htlc");
    assert_eq!(config.archethic.endpoint, "https://testnet.archethic.net");
  }

  #[test]
  fn test_bad_port_override_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    let result = apply_env_overrides(&mut config, |key| {
      (key == "HTLC_MONITOR_PORT").then(|| "not-a-port".to_string())
    });
    assert!(result.is_err());
  }

  #[test]
  fn test_empty_db_folder_needs_ephemeral() {
    let mut config = parse_config(SAMPLE).unwrap();
    assert!(!config.storage.ephemeral);
    config.storage.db_folder = String::new();
    assert!(validate_config(&config).is_err());

    config.storage.ephemeral = true;
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_invalid_cron_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    config.schedule.cron = "sometimes".to_string();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_duplicate_chain_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    let chain = config.evm.chains[0].clone();
    config.evm.chains.push(chain);
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_bad_pool_address_rejected() {
    let mut config = parse_config(SAMPLE).unwrap();
    config.evm.chains[0].pools[0].address = "0xnothex".to_string();
    assert!(validate_config(&config).is_err());

    let mut config = parse_config(SAMPLE).unwrap();
    config.archethic.pools.push("zz".to_string());
    assert!(validate_config(&config).is_err());
  }
}
