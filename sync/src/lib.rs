// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod chain_syncer;
pub mod collectors;
pub mod config;
pub mod data_sync;
pub mod escape;
pub mod metered_eth_provider;
pub mod metrics;
pub mod storage;

#[cfg(test)]
pub mod eth_mock_provider;

#[cfg(test)]
pub mod test_utils;
