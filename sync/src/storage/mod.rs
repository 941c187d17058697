// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Storage contracts consumed by the collectors and the sync service
//!
//! Implementations must make `add_many` and `delete_after` atomic per call.

mod memory;

pub use memory::*;

use crate::chain_syncer::common::SyncResult;
use crate::collectors::events::VerifierEventRecord;
use ethers::types::H256;
use serde::{Deserialize, Serialize};

/// Records that belong to a block and can be rolled back past it
pub trait BlockRecord: Clone + Send + Sync + 'static {
    fn block_number(&self) -> u64;
}

/// Persisted subset of a state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransitionRecord {
    pub block_number: u64,
    pub state_transition_hash: H256,
}

impl BlockRecord for StateTransitionRecord {
    fn block_number(&self) -> u64 {
        self.block_number
    }
}

impl BlockRecord for VerifierEventRecord {
    fn block_number(&self) -> u64 {
        self.block_number
    }
}

#[async_trait::async_trait]
pub trait RecordRepository<R: BlockRecord>: Send + Sync {
    /// Stores the records and returns their ids, in order
    async fn add_many(&self, records: Vec<R>) -> SyncResult<Vec<u64>>;

    /// All records in insertion order
    async fn get_all(&self) -> SyncResult<Vec<R>>;

    /// Deletes records with `block_number > block_number`, returns the count
    async fn delete_after(&self, block_number: u64) -> SyncResult<usize>;

    async fn delete_all(&self) -> SyncResult<usize>;
}

pub type StateTransitionRepository = dyn RecordRepository<StateTransitionRecord>;
pub type VerifierEventRepository = dyn RecordRepository<VerifierEventRecord>;

/// Tracks the last block whose data is fully stored
#[async_trait::async_trait]
pub trait SyncStatusRepository: Send + Sync {
    async fn get_last_block_number_synced(&self) -> SyncResult<Option<u64>>;

    async fn set_last_block_number_synced(&self, block_number: u64) -> SyncResult<()>;
}
