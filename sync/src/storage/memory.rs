// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory repositories

use super::{BlockRecord, RecordRepository, SyncStatusRepository};
use crate::chain_syncer::common::SyncResult;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

struct Rows<R> {
    next_id: u64,
    by_id: BTreeMap<u64, R>,
}

/// Records keyed by an increasing id, so `get_all` keeps insertion order
pub struct InMemoryRepository<R> {
    name: String,
    rows: RwLock<Rows<R>>,
}

impl<R> InMemoryRepository<R> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: RwLock::new(Rows {
                next_id: 1,
                by_id: BTreeMap::new(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl<R: BlockRecord> RecordRepository<R> for InMemoryRepository<R> {
    async fn add_many(&self, records: Vec<R>) -> SyncResult<Vec<u64>> {
        let mut rows = self.rows.write().await;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = rows.next_id;
            rows.next_id += 1;
            rows.by_id.insert(id, record);
            ids.push(id);
        }
        debug!("[{}] Added {} records", self.name, ids.len());
        Ok(ids)
    }

    async fn get_all(&self) -> SyncResult<Vec<R>> {
        Ok(self.rows.read().await.by_id.values().cloned().collect())
    }

    async fn delete_after(&self, block_number: u64) -> SyncResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.by_id.len();
        rows.by_id.retain(|_, record| record.block_number() <= block_number);
        let deleted = before - rows.by_id.len();
        debug!(
            "[{}] Deleted {} records after block {}",
            self.name, deleted, block_number
        );
        Ok(deleted)
    }

    async fn delete_all(&self) -> SyncResult<usize> {
        let mut rows = self.rows.write().await;
        let deleted = rows.by_id.len();
        rows.by_id.clear();
        Ok(deleted)
    }
}

#[derive(Default)]
pub struct InMemorySyncStatusRepository {
    last_synced: RwLock<Option<u64>>,
}

impl InMemorySyncStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_synced(block_number: u64) -> Self {
        Self {
            last_synced: RwLock::new(Some(block_number)),
        }
    }
}

#[async_trait::async_trait]
impl SyncStatusRepository for InMemorySyncStatusRepository {
    async fn get_last_block_number_synced(&self) -> SyncResult<Option<u64>> {
        Ok(*self.last_synced.read().await)
    }

    async fn set_last_block_number_synced(&self, block_number: u64) -> SyncResult<()> {
        *self.last_synced.write().await = Some(block_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StateTransitionRecord;
    use ethers::types::H256;

    fn record(block_number: u64) -> StateTransitionRecord {
        StateTransitionRecord {
            block_number,
            state_transition_hash: H256::from_low_u64_be(block_number),
        }
    }

    #[tokio::test]
    async fn test_add_and_delete_after() {
        let repo = InMemoryRepository::new("state_transitions");
        let ids = repo
            .add_many(vec![record(10), record(11), record(12)])
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(repo.delete_after(10).await.unwrap(), 2);
        assert_eq!(repo.get_all().await.unwrap(), vec![record(10)]);

        // ids keep increasing after deletes
        assert_eq!(repo.add_many(vec![record(11)]).await.unwrap(), vec![4]);
        assert_eq!(repo.delete_all().await.unwrap(), 2);
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_status() {
        let repo = InMemorySyncStatusRepository::new();
        assert_eq!(repo.get_last_block_number_synced().await.unwrap(), None);
        repo.set_last_block_number_synced(77).await.unwrap();
        assert_eq!(repo.get_last_block_number_synced().await.unwrap(), Some(77));
    }
}
