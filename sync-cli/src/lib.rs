// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::*;
use ethers::providers::Provider;
use ethers::types::Address;
use starkex_sync::chain_syncer::{BlockRange, LogRangeClient};
use starkex_sync::collectors::{
    PairedEventCollector, PairedEventConfig, StateTransition, VerifierAddressResolver,
};
use starkex_sync::config::SyncNodeConfig;
use starkex_sync::escape::{serialize_merkle_proof_for_escape, MerkleProof};
use starkex_sync::metered_eth_provider::{new_metered_eth_provider, MeteredEthHttpProvider};
use starkex_sync::metrics::SyncMetrics;
use starkex_sync::storage::InMemoryRepository;
use starkex_sync_config::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[clap(rename_all = "kebab-case")]
pub struct Args {
    #[clap(subcommand)]
    pub command: SyncCommand,
}

#[derive(Parser, Debug, PartialEq, Eq)]
#[clap(rename_all = "kebab-case")]
pub enum SyncCommand {
    // Print the escape verifier calldata words of a JSON Merkle proof
    #[clap(name = "serialize-escape-proof")]
    SerializeEscapeProof {
        #[clap(long = "proof-path")]
        proof_path: PathBuf,
    },
    // Print the state transitions emitted in blocks [from, to]
    #[clap(name = "collect-transitions")]
    CollectTransitions {
        #[clap(long = "config-path")]
        config_path: PathBuf,
        #[clap(long = "from")]
        from: u64,
        #[clap(long = "to")]
        to: u64,
    },
    // Print the verifier addresses known up to block `to`
    #[clap(name = "resolve-verifiers")]
    ResolveVerifiers {
        #[clap(long = "config-path")]
        config_path: PathBuf,
        #[clap(long = "from")]
        from: u64,
        #[clap(long = "to")]
        to: u64,
    },
    #[clap(name = "create-config-template")]
    CreateConfigTemplate { path: PathBuf },
}

/// Decimal calldata words of the proof stored at `path`
pub fn read_escape_proof_words(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read proof file {}", path.display()))?;
    let proof: MerkleProof<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse proof file {}", path.display()))?;
    Ok(serialize_merkle_proof_for_escape(&proof)
        .iter()
        .map(|word| word.to_string())
        .collect())
}

pub fn generate_config_template(path: &Path) -> anyhow::Result<()> {
    let config = SyncNodeConfig {
        eth_rpc_url: "${ETH_RPC_URL}".to_string(),
        metrics_port: Some(9184),
        ..Default::default()
    };
    config.save(path)
}

type MeteredProvider = Provider<MeteredEthHttpProvider>;

pub fn new_log_client(
    config: &SyncNodeConfig,
    metrics: Arc<SyncMetrics>,
) -> anyhow::Result<LogRangeClient<MeteredProvider>> {
    let provider = new_metered_eth_provider(
        &config.eth_rpc_url,
        metrics.clone(),
        config.fetch.max_concurrent_requests,
    )
    .with_context(|| format!("Invalid eth-rpc-url {}", config.eth_rpc_url))?;
    Ok(LogRangeClient::new(
        Arc::new(provider),
        config.fetch.clone(),
        metrics,
    ))
}

pub async fn collect_transitions(
    config: &SyncNodeConfig,
    metrics: Arc<SyncMetrics>,
    from: u64,
    to: u64,
) -> anyhow::Result<Vec<StateTransition>> {
    let collector = PairedEventCollector::new(
        new_log_client(config, metrics)?,
        Arc::new(InMemoryRepository::new("state_transitions")),
        PairedEventConfig {
            contract: config.starkex_address,
            update_event: config.trading_mode.update_event(),
        },
    );
    Ok(collector.collect(&BlockRange::numeric(from, to)).await?)
}

pub async fn resolve_verifiers(
    config: &SyncNodeConfig,
    metrics: Arc<SyncMetrics>,
    from: u64,
    to: u64,
) -> anyhow::Result<Vec<Address>> {
    let resolver = VerifierAddressResolver::new(
        new_log_client(config, metrics)?,
        Arc::new(InMemoryRepository::new("verifier_events")),
        config.verifier_proxy_address,
        config.hardcoded_verifiers.clone(),
    );
    Ok(resolver.collect(&BlockRange::numeric(from, to)).await?)
}
