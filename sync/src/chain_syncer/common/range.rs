// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block ranges used to query logs
//!
//! A range is `[start, end)` plus the hashes of the blocks it was built from.
//! Blocks with a known hash can be queried by hash, which pins the result to
//! that exact block instead of whatever block currently has the number.

use super::blocks::Block;
use ethers::types::{Log, H256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRange {
    start: u64,
    end: u64,
    hashes: BTreeMap<u64, H256>,
}

impl BlockRange {
    /// Purely numeric range covering `from..=to`.
    pub fn numeric(from: u64, to: u64) -> Self {
        Self {
            start: from,
            end: to.saturating_add(1).max(from),
            hashes: BTreeMap::new(),
        }
    }

    /// Range spanning exactly the given blocks, all with known hashes.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let hashes: BTreeMap<u64, H256> = blocks.iter().map(|b| (b.number, b.hash)).collect();
        match (hashes.keys().next(), hashes.keys().next_back()) {
            (Some(&start), Some(&last)) => Self {
                start,
                end: last + 1,
                hashes,
            },
            _ => Self::default(),
        }
    }

    /// Range `[start, end)` where only some blocks (usually the most recent)
    /// have known hashes. The bounds are widened to cover every given block.
    pub fn with_bounds(blocks: &[Block], start: u64, end: u64) -> Self {
        let from_blocks = Self::from_blocks(blocks);
        if from_blocks.hashes.is_empty() {
            return Self {
                start,
                end: end.max(start),
                hashes: BTreeMap::new(),
            };
        }
        Self {
            start: start.min(from_blocks.start),
            end: end.max(from_blocks.end),
            hashes: from_blocks.hashes,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end of the range
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn has_hashes(&self) -> bool {
        !self.hashes.is_empty()
    }

    pub fn hash_of(&self, number: u64) -> Option<H256> {
        self.hashes.get(&number).copied()
    }

    /// Splits the range into a numeric prefix and the contiguous tail of
    /// blocks with known hashes ending at `end - 1`.
    ///
    /// Returns `(from, to_exclusive, hashes)` where `from..to_exclusive` has
    /// to be queried by number and `hashes` covers `to_exclusive..end`.
    pub fn split_by_known_hashes(&self) -> (u64, u64, Vec<H256>) {
        let mut tail = Vec::new();
        let mut boundary = self.end;
        while boundary > self.start {
            match self.hashes.get(&(boundary - 1)) {
                Some(hash) => {
                    tail.push(*hash);
                    boundary -= 1;
                }
                None => break,
            }
        }
        tail.reverse();
        (self.start, boundary, tail)
    }

    /// Whether every log lies inside the range and matches the known hash of
    /// its block.
    pub fn has_all(&self, logs: &[Log]) -> bool {
        self.first_foreign_log(logs).is_none()
    }

    /// Block number of the first log that does not belong to the range.
    /// Logs without a block number are reported as block 0.
    pub fn first_foreign_log(&self, logs: &[Log]) -> Option<u64> {
        logs.iter().find_map(|log| {
            let Some(number) = log.block_number.map(|n| n.as_u64()) else {
                return Some(0);
            };
            if number < self.start || number >= self.end {
                return Some(number);
            }
            match (self.hashes.get(&number), log.block_hash) {
                (Some(expected), Some(actual)) if *expected == actual => None,
                (Some(_), _) => Some(number),
                (None, _) => None,
            }
        })
    }
}
