// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stores the on-chain data of one batch of blocks

use crate::chain_syncer::common::{BlockRange, SyncResult};
use crate::chain_syncer::eth::{LogRangeClient, LogSource};
use crate::collectors::{PairedEventCollector, PairedEventConfig, VerifierAddressResolver};
use crate::config::SyncNodeConfig;
use crate::metrics::SyncMetrics;
use crate::storage::{StateTransitionRepository, VerifierEventRepository};
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Work run by the sync service for its effects
#[async_trait::async_trait]
pub trait DataSync: Send + Sync {
    /// Collects and stores everything in `range`
    async fn sync(&self, range: BlockRange) -> SyncResult<()>;

    /// Removes stored data of blocks after `block_number`
    async fn discard_after(&self, block_number: u64) -> SyncResult<()>;
}

pub struct CollectorDataSync<S> {
    verifiers: VerifierAddressResolver<S>,
    transitions: PairedEventCollector<S>,
    resolved_verifiers: RwLock<Vec<Address>>,
    metrics: Arc<SyncMetrics>,
}

impl<S: LogSource> CollectorDataSync<S> {
    pub fn new(
        verifiers: VerifierAddressResolver<S>,
        transitions: PairedEventCollector<S>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            verifiers,
            transitions,
            resolved_verifiers: RwLock::new(vec![]),
            metrics,
        }
    }

    pub fn from_config(
        config: &SyncNodeConfig,
        source: Arc<S>,
        transition_repository: Arc<StateTransitionRepository>,
        verifier_repository: Arc<VerifierEventRepository>,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        let client = LogRangeClient::new(source, config.fetch.clone(), metrics.clone());
        let verifiers = VerifierAddressResolver::new(
            client.clone(),
            verifier_repository,
            config.verifier_proxy_address,
            config.hardcoded_verifiers.clone(),
        );
        let transitions = PairedEventCollector::new(
            client,
            transition_repository,
            PairedEventConfig {
                contract: config.starkex_address,
                update_event: config.trading_mode.update_event(),
            },
        );
        Self::new(verifiers, transitions, metrics)
    }

    /// Verifiers resolved by the last successful sync
    pub async fn resolved_verifiers(&self) -> Vec<Address> {
        self.resolved_verifiers.read().await.clone()
    }

    async fn collect(&self, range: &BlockRange) -> SyncResult<(Vec<Address>, usize)> {
        let verifiers = self.verifiers.collect(range).await?;
        let transitions = self.transitions.collect(range).await?;
        Ok((verifiers, transitions.len()))
    }
}

#[async_trait::async_trait]
impl<S: LogSource> DataSync for CollectorDataSync<S> {
    /// A failed batch leaves nothing stored for its blocks, so it can be
    /// retried as a whole.
    async fn sync(&self, range: BlockRange) -> SyncResult<()> {
        let (verifiers, transitions) = match self.collect(&range).await {
            Ok(collected) => collected,
            Err(e) => {
                let rollback_to = range.start().saturating_sub(1);
                if let Err(discard_err) = self.discard_after(rollback_to).await {
                    warn!(
                        "[CollectorDataSync] Failed to roll back blocks after {}: {:?}",
                        rollback_to, discard_err
                    );
                }
                return Err(e);
            }
        };

        self.metrics
            .state_transitions_collected
            .inc_by(transitions as u64);
        self.metrics.verifiers_resolved.set(verifiers.len() as i64);
        info!(
            "[CollectorDataSync] Synced blocks [{}, {}): {} state transitions, {} verifiers",
            range.start(),
            range.end(),
            transitions,
            verifiers.len()
        );
        *self.resolved_verifiers.write().await = verifiers;
        Ok(())
    }

    async fn discard_after(&self, block_number: u64) -> SyncResult<()> {
        self.verifiers.discard_after(block_number).await?;
        self.transitions.discard_after(block_number).await?;
        info!(
            "[CollectorDataSync] Discarded data after block {}",
            block_number
        );
        Ok(())
    }
}
