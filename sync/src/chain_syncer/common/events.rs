// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Actions accepted by the sync scheduler and the effects it requests

use super::blocks::Block;

/// Input to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Historical blocks read at startup, `latest_block` is the last block
    /// whose data is already stored.
    Init {
        blocks: Vec<Block>,
        latest_block: u64,
    },
    /// New blocks extending the current tip
    NewBlocks(Vec<Block>),
    /// Replacement blocks after a chain reorganization
    Reorg(Vec<Block>),
    SyncFinished(bool),
    DiscardFinished(bool),
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::Init { .. } => "init",
            SyncAction::NewBlocks(_) => "newBlocks",
            SyncAction::Reorg(_) => "reorg",
            SyncAction::SyncFinished(_) => "syncFinished",
            SyncAction::DiscardFinished(_) => "discardFinished",
        }
    }

    pub fn success(&self) -> Option<bool> {
        match self {
            SyncAction::SyncFinished(success) | SyncAction::DiscardFinished(success) => {
                Some(*success)
            }
            _ => None,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            SyncAction::Init { blocks, .. }
            | SyncAction::NewBlocks(blocks)
            | SyncAction::Reorg(blocks) => blocks,
            _ => &[],
        }
    }

    /// `"first - last"` of the carried blocks, if any
    pub fn block_range(&self) -> Option<String> {
        let blocks = self.blocks();
        match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) => Some(format!("{} - {}", first.number, last.number)),
            _ => None,
        }
    }
}

/// Work requested by the scheduler. At most one is outstanding at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    Sync,
    DiscardAfter,
}
