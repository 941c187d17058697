// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Chain Syncer Module
//!
//! Reorg-aware synchronization of StarkEx contract data:
//! - Batching of new blocks into sync runs
//! - Rollback of stored data when synced blocks are reorganized
//! - Log fetching that pins recent blocks by hash
//!
//! ## Architecture
//!
//! ```text
//!  ChainUpdate ──▶ SyncService ──▶ SyncScheduler (reduce) ──▶ SyncEffect
//!                      ▲                                          │
//!                      │   SyncFinished / DiscardFinished         ▼
//!                      └──────────────────────────────── DataSync task
//!                                                              │
//!                                                              ▼
//!                                            collectors ──▶ LogRangeClient
//! ```
//!
//! - `common`: blocks, ranges, configuration, scheduler actions and errors
//! - `eth`: log fetching with range bisection
//! - `scheduler`: the pure state machine and its tokio driver

pub mod common;
pub mod eth;
pub mod scheduler;

pub use common::{Block, BlockRange, ContinuousBlocks, SyncError, SyncResult};
pub use eth::{LogRangeClient, LogSource};
pub use scheduler::{ChainUpdate, SyncScheduler, SyncService, SyncState};
