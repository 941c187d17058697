// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration types for log fetching and scheduling

use serde::{Deserialize, Serialize};

/// Number of blocks handed to a single sync run
pub const SYNC_BATCH_SIZE: usize = 6000;

/// Configuration for the log fetching behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Number of most recent blocks that are always queried by block hash
    #[serde(default = "default_safe_block_distance")]
    pub safe_block_distance: u64,

    /// Maximum number of `eth_getLogs` requests in flight for one range
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            safe_block_distance: default_safe_block_distance(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_safe_block_distance() -> u64 {
    40
}

fn default_max_concurrent_requests() -> usize {
    10
}

/// Configuration for the sync scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// First block to sync from when nothing has been synced yet
    #[serde(default)]
    pub earliest_block: u64,

    /// Delay before a failed sync is reported back and retried
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            earliest_block: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    SYNC_BATCH_SIZE
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let fetch: FetchConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(fetch, FetchConfig::default());
        assert_eq!(fetch.safe_block_distance, 40);

        let scheduler: SchedulerConfig = serde_yaml::from_str("earliest-block: 11813207").unwrap();
        assert_eq!(scheduler.batch_size, 6000);
        assert_eq!(scheduler.earliest_block, 11813207);
        assert_eq!(scheduler.retry_delay_ms, 5_000);
    }
}
