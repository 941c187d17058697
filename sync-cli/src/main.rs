// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::*;
use prometheus::Registry;
use starkex_sync::config::SyncNodeConfig;
use starkex_sync::metrics::{start_prometheus_server, SyncMetrics};
use starkex_sync_cli::{
    collect_transitions, generate_config_template, read_escape_proof_words, resolve_verifiers,
    Args, SyncCommand,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    match args.command {
        SyncCommand::SerializeEscapeProof { proof_path } => {
            for word in read_escape_proof_words(&proof_path)? {
                println!("{}", word);
            }
        }
        SyncCommand::CollectTransitions {
            config_path,
            from,
            to,
        } => {
            let (config, metrics) = load_config_with_metrics(&config_path).await?;
            let transitions = collect_transitions(&config, metrics, from, to).await?;
            for transition in &transitions {
                println!("{}", serde_json::to_string(transition)?);
            }
            tracing::info!(
                "Collected {} state transitions in blocks [{}, {}]",
                transitions.len(),
                from,
                to
            );
        }
        SyncCommand::ResolveVerifiers {
            config_path,
            from,
            to,
        } => {
            let (config, metrics) = load_config_with_metrics(&config_path).await?;
            for verifier in resolve_verifiers(&config, metrics, from, to).await? {
                println!("{:?}", verifier);
            }
        }
        SyncCommand::CreateConfigTemplate { path } => {
            generate_config_template(&path)?;
            tracing::info!("Sync config template generated at {}", path.display());
        }
    }
    Ok(())
}

async fn load_config_with_metrics(
    path: &Path,
) -> anyhow::Result<(SyncNodeConfig, Arc<SyncMetrics>)> {
    let config = SyncNodeConfig::load_with_env(path)?;
    let registry = Registry::new();
    let metrics = Arc::new(SyncMetrics::new(&registry));
    if let Some(port) = config.metrics_port {
        start_prometheus_server(SocketAddr::from(([0, 0, 0, 0], port)), registry).await?;
    }
    Ok((config, metrics))
}
