// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gap-free block sequences
//!
//! [`ContinuousBlocks`] is the window of blocks the scheduler still has to
//! process. Every transformation returns a new value and re-checks that block
//! numbers increase by exactly one.

use super::types::{SyncError, SyncResult};
use ethers::types::H256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: H256,
}

impl Block {
    pub fn new(number: u64, hash: H256) -> Self {
        Self { number, hash }
    }
}

/// Blocks in order and without gaps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuousBlocks {
    blocks: Vec<Block>,
}

impl ContinuousBlocks {
    pub fn new(blocks: Vec<Block>) -> SyncResult<Self> {
        ensure_continuous(&blocks)?;
        Ok(Self { blocks })
    }

    pub fn first(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    /// Prepends the blocks of `new_start` that are strictly older than the
    /// current first block. Used to re-admit a failed batch and to merge
    /// historical blocks on init.
    pub fn prepend_earlier(&self, new_start: &[Block]) -> SyncResult<Self> {
        let first = self.first().map(|b| b.number);
        let mut blocks: Vec<Block> = new_start
            .iter()
            .filter(|b| first.map_or(true, |first| b.number < first))
            .copied()
            .collect();
        blocks.extend_from_slice(&self.blocks);
        Self::new(blocks)
    }

    /// Keeps the blocks older than `new_tail[0]` and appends `new_tail`.
    pub fn replace_tail(&self, new_tail: &[Block]) -> SyncResult<Self> {
        let Some(tail_start) = new_tail.first().map(|b| b.number) else {
            return Ok(self.clone());
        };
        let mut blocks: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.number < tail_start)
            .copied()
            .collect();
        blocks.extend_from_slice(new_tail);
        Self::new(blocks)
    }

    pub fn concat(&self, new_blocks: &[Block]) -> SyncResult<Self> {
        let mut blocks = self.blocks.clone();
        blocks.extend_from_slice(new_blocks);
        Self::new(blocks)
    }

    /// Splits off the first `n` blocks, returning them with the remainder.
    pub fn take_first(&self, n: usize) -> (Vec<Block>, ContinuousBlocks) {
        let split = n.min(self.blocks.len());
        let (taken, rest) = self.blocks.split_at(split);
        (
            taken.to_vec(),
            ContinuousBlocks {
                blocks: rest.to_vec(),
            },
        )
    }
}

fn ensure_continuous(blocks: &[Block]) -> SyncResult<()> {
    for pair in blocks.windows(2) {
        if pair[1].number != pair[0].number + 1 {
            return Err(SyncError::NonContinuousBlocks {
                prev: pair[0].number,
                next: pair[1].number,
            });
        }
    }
    Ok(())
}
