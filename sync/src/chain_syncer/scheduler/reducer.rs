// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pure state transitions of the sync scheduler
//!
//! `reduce` never performs I/O. It returns the next state together with the
//! effects the caller has to run. While an effect is outstanding
//! (`processing`) no other effect is emitted.

use crate::chain_syncer::common::{
    Block, ContinuousBlocks, SyncAction, SyncEffect, SyncError, SyncResult,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub initialized: bool,
    pub processing: bool,
    pub reorg_required: bool,
    /// Blocks waiting to be synced
    pub pending: ContinuousBlocks,
    /// Blocks of the outstanding `Sync` effect
    pub in_flight: Vec<Block>,
    /// Highest block handed to a sync, or the last synced block at init
    pub latest_block: u64,
}

pub fn reduce(
    state: &SyncState,
    action: SyncAction,
    batch_size: usize,
) -> SyncResult<(SyncState, Vec<SyncEffect>)> {
    match action {
        SyncAction::Init {
            blocks,
            latest_block,
        } => {
            if state.initialized {
                return Err(SyncError::InvalidDispatch(
                    "Scheduler is already initialized".to_string(),
                ));
            }
            let next = SyncState {
                initialized: true,
                latest_block,
                pending: state.pending.prepend_earlier(&blocks)?,
                ..state.clone()
            };
            Ok(advance(next, batch_size))
        }
        SyncAction::NewBlocks(blocks) => {
            let next = SyncState {
                pending: state.pending.concat(&blocks)?,
                ..state.clone()
            };
            Ok(advance(next, batch_size))
        }
        SyncAction::Reorg(blocks) => {
            let Some(first) = blocks.first() else {
                return Ok((state.clone(), vec![]));
            };
            let next = if state.latest_block >= first.number {
                // data of replaced blocks may already be stored
                SyncState {
                    reorg_required: true,
                    pending: ContinuousBlocks::new(blocks)?,
                    ..state.clone()
                }
            } else {
                SyncState {
                    pending: state.pending.replace_tail(&blocks)?,
                    ..state.clone()
                }
            };
            Ok(advance(next, batch_size))
        }
        SyncAction::SyncFinished(success) => {
            ensure_processing(state, "SyncFinished")?;
            let pending = if success {
                state.pending.clone()
            } else {
                state.pending.prepend_earlier(&state.in_flight)?
            };
            let next = SyncState {
                processing: false,
                pending,
                in_flight: vec![],
                ..state.clone()
            };
            Ok(advance(next, batch_size))
        }
        SyncAction::DiscardFinished(_) => {
            ensure_processing(state, "DiscardFinished")?;
            // a failed discard is not retried
            let next = SyncState {
                processing: false,
                reorg_required: false,
                ..state.clone()
            };
            Ok(advance(next, batch_size))
        }
    }
}

/// Issues the next effect if the scheduler is idle.
fn advance(mut state: SyncState, batch_size: usize) -> (SyncState, Vec<SyncEffect>) {
    if !state.initialized || state.processing {
        return (state, vec![]);
    }
    if state.reorg_required {
        state.processing = true;
        return (state, vec![SyncEffect::DiscardAfter]);
    }

    let (taken, rest) = state.pending.take_first(batch_size);
    let Some(last) = taken.last() else {
        return (state, vec![]);
    };
    state.latest_block = last.number;
    state.in_flight = taken;
    state.pending = rest;
    state.processing = true;
    (state, vec![SyncEffect::Sync])
}

fn ensure_processing(state: &SyncState, action: &str) -> SyncResult<()> {
    if state.processing {
        Ok(())
    } else {
        Err(SyncError::InvalidDispatch(format!(
            "{} dispatched while no effect is outstanding",
            action
        )))
    }
}
