// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reorg-aware log fetching
//!
//! Old blocks are queried by number in one request. The `safe_block_distance`
//! most recent blocks of a range are queried one by one by block hash, so a
//! log can never come from a sibling block produced by a reorg.

use crate::chain_syncer::common::{BlockRange, FetchConfig, SyncError, SyncResult};
use crate::metrics::SyncMetrics;
use ethers::providers::{JsonRpcClient, Middleware, Provider};
use ethers::types::{Filter, Log, H256};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::sync::Arc;
use tap::TapFallible;
use tracing::{debug, error, warn};

/// Anything that can answer `eth_getLogs`
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    /// Fails with [`SyncError::ResponseTooLarge`] when the provider refuses to
    /// return the full result set.
    async fn get_logs(&self, filter: &Filter) -> SyncResult<Vec<Log>>;
}

#[async_trait::async_trait]
impl<P> LogSource for Provider<P>
where
    P: JsonRpcClient + 'static,
{
    async fn get_logs(&self, filter: &Filter) -> SyncResult<Vec<Log>> {
        Middleware::get_logs(self, filter)
            .await
            .map_err(SyncError::from)
    }
}

/// One request in a [`LogRangeClient::get_logs_in_range`] plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogQuery {
    /// Inclusive block number range
    Range { from: u64, to: u64 },
    BlockHash(H256),
}

pub struct LogRangeClient<S> {
    source: Arc<S>,
    config: FetchConfig,
    metrics: Arc<SyncMetrics>,
}

impl<S> Clone for LogRangeClient<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: LogSource> LogRangeClient<S> {
    pub fn new(source: Arc<S>, config: FetchConfig, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            source,
            config,
            metrics,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Fetches all logs matching `filter` (address and topics) in `range`.
    ///
    /// Fails as a whole with [`SyncError::ReorgDetected`] if any returned log
    /// lies outside of the range or does not match a known block hash.
    pub async fn get_logs_in_range(
        &self,
        range: &BlockRange,
        filter: &Filter,
    ) -> SyncResult<Vec<Log>> {
        if range.is_empty() {
            return Ok(vec![]);
        }
        let queries = self.plan(range);
        debug!(
            "[LogRangeClient] Fetching logs for blocks [{}, {}) with {} queries",
            range.start(),
            range.end(),
            queries.len()
        );

        let mut logs = Vec::new();
        for batch in queries.chunks(self.config.max_concurrent_requests.max(1)) {
            let tasks = batch.iter().map(|query| self.run_query(filter, *query));
            for batch_logs in try_join_all(tasks).await? {
                logs.extend(batch_logs);
            }
        }

        if let Some(block_number) = range.first_foreign_log(&logs) {
            self.metrics.reorgs_detected.inc();
            warn!(
                "[LogRangeClient] Log from block {} does not belong to range [{}, {})",
                block_number,
                range.start(),
                range.end()
            );
            return Err(SyncError::ReorgDetected(block_number));
        }
        Ok(logs)
    }

    /// Fetches logs for `from..=to`, bisecting the range whenever the provider
    /// reports the response as too large. A single block cannot be split and
    /// its error is returned.
    pub fn get_all_logs<'a>(
        &'a self,
        filter: &'a Filter,
        from: u64,
        to: u64,
    ) -> BoxFuture<'a, SyncResult<Vec<Log>>> {
        async move {
            let ranged = filter.clone().from_block(from).to_block(to);
            match self.source.get_logs(&ranged).await {
                Err(SyncError::ResponseTooLarge(message)) if from < to => {
                    self.metrics.log_range_bisections.inc();
                    let mid = from + (to - from) / 2;
                    debug!(
                        "[LogRangeClient] Response too large for [{}, {}], splitting at {}: {}",
                        from, to, mid, message
                    );
                    let (mut left, right) = futures::try_join!(
                        self.get_all_logs(filter, from, mid),
                        self.get_all_logs(filter, mid + 1, to)
                    )?;
                    left.extend(right);
                    Ok(left)
                }
                result => result.tap_err(|e| {
                    error!(
                        "[LogRangeClient] get_logs failed for [{}, {}]. Filter: {:?}. Error {:?}",
                        from, to, filter, e
                    )
                }),
            }
        }
        .boxed()
    }

    fn plan(&self, range: &BlockRange) -> Vec<LogQuery> {
        let (from, mut to, mut hashes) = range.split_by_known_hashes();
        let safe = self.config.safe_block_distance as usize;
        if hashes.len() > safe {
            to += (hashes.len() - safe) as u64;
            hashes.drain(..hashes.len() - safe);
        }

        let mut queries = Vec::with_capacity(hashes.len() + 1);
        if from != to {
            queries.push(LogQuery::Range { from, to: to - 1 });
        }
        queries.extend(hashes.into_iter().map(LogQuery::BlockHash));
        queries
    }

    async fn run_query(&self, filter: &Filter, query: LogQuery) -> SyncResult<Vec<Log>> {
        match query {
            LogQuery::Range { from, to } => self.get_all_logs(filter, from, to).await,
            LogQuery::BlockHash(hash) => {
                let pinned = filter.clone().at_block_hash(hash);
                self.source.get_logs(&pinned).await.tap_err(|e| {
                    error!(
                        "[LogRangeClient] get_logs failed for block {:?}. Error {:?}",
                        hash, e
                    )
                })
            }
        }
    }
}
