// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::chain_syncer::common::{FetchConfig, SchedulerConfig};
use crate::collectors::events::UpdateEventKind;
use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use starkex_sync_config::Config;
use std::path::Path;
use tracing::warn;

/// Which state update event the StarkEx deployment emits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TradingMode {
    #[default]
    Perpetual,
    Spot,
}

impl TradingMode {
    pub fn update_event(&self) -> UpdateEventKind {
        match self {
            TradingMode::Perpetual => UpdateEventKind::UpdateState,
            TradingMode::Spot => UpdateEventKind::RootUpdate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncNodeConfig {
    // Rpc url of the Eth fullnode logs are read from
    pub eth_rpc_url: String,
    #[serde(default)]
    pub trading_mode: TradingMode,
    // The StarkEx contract emitting state transition events
    pub starkex_address: Address,
    // The proxy emitting verifier upgrade events
    pub verifier_proxy_address: Address,
    // Verifiers deployed before the proxy events were emitted
    #[serde(default)]
    pub hardcoded_verifiers: Vec<Address>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    // Port of the prometheus server, disabled when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for SyncNodeConfig {
    fn default() -> Self {
        Self {
            eth_rpc_url: "http://localhost:8545".to_string(),
            trading_mode: TradingMode::default(),
            starkex_address: Address::zero(),
            verifier_proxy_address: Address::zero(),
            hardcoded_verifiers: vec![],
            fetch: FetchConfig::default(),
            scheduler: SchedulerConfig::default(),
            metrics_port: None,
        }
    }
}

impl Config for SyncNodeConfig {}

impl SyncNodeConfig {
    /// Loads the config file, replacing `${VAR}` with environment variables
    /// before parsing, and validates the result.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sync config file {}", path.display()))?;
        let content = substitute_env_vars(&content)?;
        let config = Self::from_str_with_path(&content, path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.eth_rpc_url)
            .with_context(|| format!("Invalid eth-rpc-url {}", self.eth_rpc_url))?;
        if self.scheduler.batch_size == 0 {
            return Err(anyhow!("scheduler.batch-size must be positive"));
        }
        if self.fetch.safe_block_distance == 0 {
            return Err(anyhow!("fetch.safe-block-distance must be positive"));
        }
        if self.fetch.max_concurrent_requests == 0 {
            return Err(anyhow!("fetch.max-concurrent-requests must be positive"));
        }
        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match std::env::var(var_name) {
            Ok(var_value) => result = result.replace(full_match, &var_value),
            Err(_) => warn!(
                "Environment variable {} not found, keeping placeholder",
                var_name
            ),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG_YAML: &str = r#"
eth-rpc-url: ${STARKEX_SYNC_TEST_RPC_URL}
trading-mode: spot
starkex-address: "0x5fdcca53617f4d2b9134b29090c87d01058e27e9"
verifier-proxy-address: "0x47312450b3ac8b5b8e247a6bb6d523e7605bdb60"
hardcoded-verifiers:
  - "0xb1eda32c467569fbdc8c3e041c81825d76b32b84"
fetch:
  safe-block-distance: 20
scheduler:
  earliest-block: 11813207
"#;

    fn yaml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_with_env() {
        std::env::set_var("STARKEX_SYNC_TEST_RPC_URL", "http://eth.local:8545");
        let file = yaml_file(CONFIG_YAML);
        let config = SyncNodeConfig::load_with_env(file.path()).unwrap();

        assert_eq!(config.eth_rpc_url, "http://eth.local:8545");
        assert_eq!(config.trading_mode, TradingMode::Spot);
        assert_eq!(config.trading_mode.update_event(), UpdateEventKind::RootUpdate);
        assert_eq!(config.hardcoded_verifiers.len(), 1);
        assert_eq!(config.fetch.safe_block_distance, 20);
        assert_eq!(config.fetch.max_concurrent_requests, 10);
        assert_eq!(config.scheduler.earliest_block, 11813207);
        assert_eq!(config.scheduler.batch_size, 6000);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_missing_env_var_keeps_placeholder() {
        let content = substitute_env_vars("url: ${STARKEX_SYNC_TEST_UNSET_VARIABLE}").unwrap();
        assert_eq!(content, "url: ${STARKEX_SYNC_TEST_UNSET_VARIABLE}");

        // the placeholder is not a valid url
        let file = yaml_file(&CONFIG_YAML.replace(
            "STARKEX_SYNC_TEST_RPC_URL",
            "STARKEX_SYNC_TEST_UNSET_VARIABLE",
        ));
        assert!(SyncNodeConfig::load_with_env(file.path()).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(SyncNodeConfig::default().validate().is_ok());

        let mut config = SyncNodeConfig::default();
        config.scheduler.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = SyncNodeConfig::default();
        config.fetch.safe_block_distance = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        let config = SyncNodeConfig {
            metrics_port: Some(9184),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SyncNodeConfig::load_with_env(&path).unwrap(), config);
    }
}
