// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scheduler driver
//!
//! [`SyncScheduler`] applies actions to the reducer and hands every emitted
//! effect to a [`SyncEffectHandler`]. [`SyncService`] owns a scheduler inside
//! a single tokio loop, so dispatches are serialized, and runs the effects as
//! tasks that report back through a completion channel.

use super::reducer::{reduce, SyncState};
use crate::chain_syncer::common::{
    Block, BlockRange, SchedulerConfig, SyncAction, SyncEffect, SyncResult,
};
use crate::data_sync::DataSync;
use crate::metrics::SyncMetrics;
use crate::storage::SyncStatusRepository;
use std::sync::Arc;
use std::time::Duration;
use tap::TapFallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives the effects emitted by the scheduler.
///
/// Handlers are called synchronously with the state after the transition and
/// must report completion later with `SyncFinished` or `DiscardFinished`.
pub trait SyncEffectHandler {
    fn sync(&mut self, state: &SyncState);

    fn discard_after(&mut self, state: &SyncState);
}

pub struct SyncScheduler<H> {
    state: SyncState,
    batch_size: usize,
    handler: H,
    metrics: Option<Arc<SyncMetrics>>,
}

impl<H: SyncEffectHandler> SyncScheduler<H> {
    pub fn new(handler: H, batch_size: usize) -> Self {
        Self {
            state: SyncState::default(),
            batch_size,
            handler,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Applies `action` and runs the resulting effect, if any. A failed
    /// precondition leaves the state untouched.
    pub fn dispatch(&mut self, action: SyncAction) -> SyncResult<()> {
        debug!(
            "[SyncScheduler] Dispatching {}, success: {:?}, blocks: {:?}",
            action.name(),
            action.success(),
            action.block_range()
        );
        let (state, effects) = reduce(&self.state, action, self.batch_size)?;
        self.state = state;
        if let Some(metrics) = &self.metrics {
            metrics.pending_blocks.set(self.state.pending.len() as i64);
        }

        for effect in effects {
            match effect {
                SyncEffect::Sync => self.handler.sync(&self.state),
                SyncEffect::DiscardAfter => self.handler.discard_after(&self.state),
            }
        }
        Ok(())
    }
}

/// Block updates fed into [`SyncService::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainUpdate {
    /// Blocks after the last synced block known at startup
    Init(Vec<Block>),
    NewBlocks(Vec<Block>),
    Reorg(Vec<Block>),
}

impl ChainUpdate {
    fn into_action(self, last_synced: u64) -> SyncAction {
        match self {
            ChainUpdate::Init(blocks) => SyncAction::Init {
                blocks,
                latest_block: last_synced,
            },
            ChainUpdate::NewBlocks(blocks) => SyncAction::NewBlocks(blocks),
            ChainUpdate::Reorg(blocks) => SyncAction::Reorg(blocks),
        }
    }
}

/// Runs scheduler effects as tokio tasks
struct EffectRunner<D> {
    data_sync: Arc<D>,
    status: Arc<dyn SyncStatusRepository>,
    metrics: Arc<SyncMetrics>,
    completions: mpsc::UnboundedSender<SyncAction>,
    retry_delay: Duration,
}

impl<D: DataSync + 'static> SyncEffectHandler for EffectRunner<D> {
    fn sync(&mut self, state: &SyncState) {
        let range = BlockRange::from_blocks(&state.in_flight);
        let latest_block = state.latest_block;
        let data_sync = self.data_sync.clone();
        let status = self.status.clone();
        let metrics = self.metrics.clone();
        let completions = self.completions.clone();
        let retry_delay = self.retry_delay;

        metrics.sync_batches_started.inc();
        tokio::spawn(async move {
            let success = match sync_batch(data_sync.as_ref(), status.as_ref(), range, latest_block)
                .await
            {
                Ok(()) => {
                    metrics.last_synced_block.set(latest_block as i64);
                    true
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(
                            "[SyncService] Sync up to block {} failed, retrying in {:?}. Error {:?}",
                            latest_block, retry_delay, e
                        );
                    } else {
                        error!(
                            "[SyncService] Sync up to block {} failed with non-recoverable error, retrying in {:?}. Error {:?}",
                            latest_block, retry_delay, e
                        );
                    }
                    metrics.sync_batches_failed.inc();
                    metrics.sync_errors.with_label_values(&[e.error_type()]).inc();
                    tokio::time::sleep(retry_delay).await;
                    false
                }
            };
            let _ = completions.send(SyncAction::SyncFinished(success));
        });
    }

    fn discard_after(&mut self, state: &SyncState) {
        let target = state
            .pending
            .first()
            .map(|b| b.number.saturating_sub(1))
            .unwrap_or(state.latest_block);
        let data_sync = self.data_sync.clone();
        let status = self.status.clone();
        let metrics = self.metrics.clone();
        let completions = self.completions.clone();

        metrics.discards_started.inc();
        tokio::spawn(async move {
            let success = match discard_batch(data_sync.as_ref(), status.as_ref(), target).await {
                Ok(()) => {
                    info!("[SyncService] Discarded data after block {}", target);
                    metrics.last_synced_block.set(target as i64);
                    true
                }
                Err(e) => {
                    warn!(
                        "[SyncService] Discard after block {} failed, continuing without it. Error {:?}",
                        target, e
                    );
                    metrics.discards_failed.inc();
                    metrics.sync_errors.with_label_values(&[e.error_type()]).inc();
                    false
                }
            };
            let _ = completions.send(SyncAction::DiscardFinished(success));
        });
    }
}

async fn sync_batch<D: DataSync + ?Sized>(
    data_sync: &D,
    status: &dyn SyncStatusRepository,
    range: BlockRange,
    latest_block: u64,
) -> SyncResult<()> {
    data_sync.sync(range).await?;
    status.set_last_block_number_synced(latest_block).await
}

async fn discard_batch<D: DataSync + ?Sized>(
    data_sync: &D,
    status: &dyn SyncStatusRepository,
    block_number: u64,
) -> SyncResult<()> {
    data_sync.discard_after(block_number).await?;
    status.set_last_block_number_synced(block_number).await
}

pub struct SyncService<D> {
    data_sync: Arc<D>,
    status: Arc<dyn SyncStatusRepository>,
    config: SchedulerConfig,
    metrics: Arc<SyncMetrics>,
}

impl<D: DataSync + 'static> SyncService<D> {
    pub fn new(
        data_sync: Arc<D>,
        status: Arc<dyn SyncStatusRepository>,
        config: SchedulerConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            data_sync,
            status,
            config,
            metrics,
        }
    }

    /// Drops data stored after the last synced block, which a previous run
    /// may have left half written, and returns that block.
    pub async fn start(&self) -> SyncResult<u64> {
        let last_synced = self
            .status
            .get_last_block_number_synced()
            .await?
            .unwrap_or(self.config.earliest_block);
        info!(
            "[SyncService] Starting from last synced block {}",
            last_synced
        );
        self.data_sync.discard_after(last_synced).await?;
        self.metrics.last_synced_block.set(last_synced as i64);
        Ok(last_synced)
    }

    /// Runs until `cancel` fires, or until `updates` is closed and the
    /// outstanding effect has completed. Invalid updates stop the service.
    pub async fn run(
        self,
        mut updates: mpsc::Receiver<ChainUpdate>,
        cancel: CancellationToken,
    ) -> SyncResult<()> {
        let last_synced = self.start().await?;
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
        let runner = EffectRunner {
            data_sync: self.data_sync.clone(),
            status: self.status.clone(),
            metrics: self.metrics.clone(),
            completions: completion_tx,
            retry_delay: Duration::from_millis(self.config.retry_delay_ms),
        };
        let mut scheduler =
            SyncScheduler::new(runner, self.config.batch_size).with_metrics(self.metrics.clone());

        let mut updates_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[SyncService] Cancelled");
                    break;
                }
                update = updates.recv(), if updates_open => {
                    match update {
                        Some(update) => scheduler
                            .dispatch(update.into_action(last_synced))
                            .tap_err(|e| error!("[SyncService] Invalid chain update: {:?}", e))?,
                        None => {
                            info!("[SyncService] Chain updates closed");
                            updates_open = false;
                        }
                    }
                }
                Some(action) = completion_rx.recv() => {
                    scheduler
                        .dispatch(action)
                        .tap_err(|e| error!("[SyncService] Invalid completion: {:?}", e))?;
                }
            }
            if !updates_open && !scheduler.state().processing {
                info!(
                    "[SyncService] Stopped at block {}",
                    scheduler.state().latest_block
                );
                break;
            }
        }
        Ok(())
    }
}
