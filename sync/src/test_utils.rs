// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::chain_syncer::common::{Block, SyncError, SyncResult};
use crate::chain_syncer::eth::LogSource;
use crate::collectors::events::{
    IMPLEMENTATION_ADDED, LOG_ROOT_UPDATE, LOG_STATE_TRANSITION_FACT, LOG_UPDATE_STATE, UPGRADED,
};
use ethers::abi::Token;
use ethers::types::{
    Address, BlockNumber, Filter, FilterBlockOption, Log, ValueOrArray, H256, U256, U64,
};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Mutex;

/// Deterministic hash of block `number` on the canonical test chain
pub fn block_hash(number: u64) -> H256 {
    H256::from_low_u64_be(0x1000_0000 + number)
}

pub fn blocks(numbers: RangeInclusive<u64>) -> Vec<Block> {
    numbers.map(|n| Block::new(n, block_hash(n))).collect()
}

/// Log without payload in block `number` with the given block hash
pub fn log_at(number: u64, hash: H256) -> Log {
    Log {
        block_number: Some(U64::from(number)),
        block_hash: Some(hash),
        transaction_hash: Some(H256::from_low_u64_be(number)),
        ..Default::default()
    }
}

/// Log on the canonical test chain
pub fn raw_log(block_number: u64, tx_hash: H256, topics: Vec<H256>, data: Vec<u8>) -> Log {
    Log {
        topics,
        data: data.into(),
        block_number: Some(U64::from(block_number)),
        block_hash: Some(block_hash(block_number)),
        transaction_hash: Some(tx_hash),
        ..Default::default()
    }
}

pub fn fact_log(block_number: u64, tx_hash: H256, fact: H256) -> Log {
    raw_log(
        block_number,
        tx_hash,
        vec![LOG_STATE_TRANSITION_FACT.topic()],
        ethers::abi::encode(&[Token::FixedBytes(fact.as_bytes().to_vec())]),
    )
}

pub fn update_state_log(
    block_number: u64,
    tx_hash: H256,
    sequence_number: u64,
    batch_id: u64,
) -> Log {
    raw_log(
        block_number,
        tx_hash,
        vec![LOG_UPDATE_STATE.topic()],
        ethers::abi::encode(&[
            Token::Uint(U256::from(sequence_number)),
            Token::Uint(U256::from(batch_id)),
        ]),
    )
}

pub fn root_update_log(
    block_number: u64,
    tx_hash: H256,
    sequence_number: u64,
    batch_id: u64,
) -> Log {
    raw_log(
        block_number,
        tx_hash,
        vec![LOG_ROOT_UPDATE.topic()],
        ethers::abi::encode(&[
            Token::Uint(U256::from(sequence_number)),
            Token::Uint(U256::from(batch_id)),
            Token::Uint(U256::from(1)),
            Token::Uint(U256::from(2)),
            Token::Uint(U256::from(3)),
        ]),
    )
}

/// `ImplementationAdded` whose initializer is the ABI encoded `verifier`
pub fn implementation_added_log(
    block_number: u64,
    implementation: Address,
    verifier: Address,
) -> Log {
    implementation_added_log_with_initializer(
        block_number,
        implementation,
        ethers::abi::encode(&[Token::Address(verifier)]),
    )
}

pub fn implementation_added_log_with_initializer(
    block_number: u64,
    implementation: Address,
    initializer: Vec<u8>,
) -> Log {
    raw_log(
        block_number,
        H256::from_low_u64_be(block_number),
        vec![IMPLEMENTATION_ADDED.topic(), H256::from(implementation)],
        ethers::abi::encode(&[Token::Bytes(initializer), Token::Bool(false)]),
    )
}

pub fn upgraded_log(block_number: u64, implementation: Address) -> Log {
    raw_log(
        block_number,
        H256::from_low_u64_be(block_number),
        vec![UPGRADED.topic(), H256::from(implementation)],
        vec![],
    )
}

/// A log query as seen by [`MockLogSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Range(u64, u64),
    Hash(H256),
}

impl Query {
    fn from_filter(filter: &Filter) -> Self {
        match &filter.block_option {
            FilterBlockOption::AtBlockHash(hash) => Query::Hash(*hash),
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => Query::Range(block_number(from_block), block_number(to_block)),
        }
    }
}

fn block_number(block: &Option<BlockNumber>) -> u64 {
    block
        .as_ref()
        .and_then(|b| b.as_number())
        .map(|n| n.as_u64())
        .unwrap_or_default()
}

/// Log source backed by a list of logs.
///
/// Range queries return the logs inside the range, hash queries the logs
/// with that block hash. Every query is recorded.
#[derive(Debug, Default)]
pub struct MockLogSource {
    logs: Vec<Log>,
    size_limit: Option<usize>,
    failing_ranges: Vec<(u64, u64)>,
    overrides: HashMap<Query, SyncResult<Vec<Log>>>,
    queries: Mutex<Vec<Query>>,
}

impl MockLogSource {
    pub fn with_logs(logs: Vec<Log>) -> Self {
        Self {
            logs,
            ..Default::default()
        }
    }

    /// Queries returning more than `limit` logs fail as too large
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// The exact range `from..=to` fails as too large
    pub fn with_failing_range(mut self, from: u64, to: u64) -> Self {
        self.failing_ranges.push((from, to));
        self
    }

    pub fn with_override(mut self, query: Query, logs: Vec<Log>) -> Self {
        self.overrides.insert(query, Ok(logs));
        self
    }

    pub fn with_error(mut self, query: Query, error: SyncError) -> Self {
        self.overrides.insert(query, Err(error));
        self
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    fn matches_topics(filter: &Filter, log: &Log) -> bool {
        let Some(topic0) = &filter.topics[0] else {
            return true;
        };
        let Some(log_topic) = log.topics.first() else {
            return false;
        };
        match topic0 {
            ValueOrArray::Value(Some(topic)) => topic == log_topic,
            ValueOrArray::Value(None) => true,
            ValueOrArray::Array(topics) => topics.iter().any(|t| t.as_ref() == Some(log_topic)),
        }
    }
}

#[async_trait::async_trait]
impl LogSource for MockLogSource {
    async fn get_logs(&self, filter: &Filter) -> SyncResult<Vec<Log>> {
        let query = Query::from_filter(filter);
        self.queries.lock().unwrap().push(query);

        if let Some(response) = self.overrides.get(&query) {
            return response.clone();
        }
        let logs: Vec<Log> = self
            .logs
            .iter()
            .filter(|log| Self::matches_topics(filter, log))
            .filter(|log| match query {
                Query::Hash(hash) => log.block_hash == Some(hash),
                Query::Range(from, to) => {
                    let number = log.block_number.map(|n| n.as_u64()).unwrap_or_default();
                    from <= number && number <= to
                }
            })
            .cloned()
            .collect();

        let too_large = match query {
            Query::Range(from, to) => self.failing_ranges.contains(&(from, to)),
            Query::Hash(_) => false,
        } || self.size_limit.map_or(false, |limit| logs.len() > limit);
        if too_large {
            return Err(SyncError::ResponseTooLarge(format!(
                "Log response size exceeded for {:?}",
                query
            )));
        }
        Ok(logs)
    }
}
