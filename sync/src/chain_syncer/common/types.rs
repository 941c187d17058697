// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the syncer, collectors and storage

use ethers::providers::ProviderError;

pub type SyncResult<T> = Result<T, SyncError>;

/// Error type for sync operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Provider refused to return the whole result set for a log query
    #[error("Log response size exceeded: {0}")]
    ResponseTooLarge(String),

    /// Returned logs do not belong to the requested blocks
    #[error("Reorg detected at block {0}")]
    ReorgDetected(u64),

    #[error("Some events have no pair: {0} events decoded")]
    UnpairedEvent(usize),

    #[error("Mismatched state transition: {0}")]
    MismatchedTransition(String),

    #[error("Blocks are not continuous: block {next} follows block {prev}")]
    NonContinuousBlocks { prev: u64, next: u64 },

    /// Scheduler precondition violation, i.e. a driver bug
    #[error("Invalid dispatch: {0}")]
    InvalidDispatch(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failure reported by a repository implementation
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Messages providers use to reject oversized `eth_getLogs` responses
const RESPONSE_TOO_LARGE_MARKERS: &[&str] = &[
    "Log response size exceeded",
    "query returned more than",
    "response size exceeded",
];

impl SyncError {
    /// Whether this error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::Rpc(_) | SyncError::ResponseTooLarge(_) | SyncError::ReorgDetected(_)
        )
    }

    /// Short label used for metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            SyncError::Rpc(_) => "rpc",
            SyncError::ResponseTooLarge(_) => "response_too_large",
            SyncError::ReorgDetected(_) => "reorg_detected",
            SyncError::UnpairedEvent(_) => "unpaired_event",
            SyncError::MismatchedTransition(_) => "mismatched_transition",
            SyncError::NonContinuousBlocks { .. } => "non_continuous_blocks",
            SyncError::InvalidDispatch(_) => "invalid_dispatch",
            SyncError::Decode(_) => "decode",
            SyncError::InvalidResponse(_) => "invalid_response",
            SyncError::Storage(_) => "storage",
        }
    }
}

impl From<ProviderError> for SyncError {
    fn from(e: ProviderError) -> Self {
        let message = e.to_string();
        if RESPONSE_TOO_LARGE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
        {
            SyncError::ResponseTooLarge(message)
        } else {
            SyncError::Rpc(message)
        }
    }
}

impl From<ethers::abi::Error> for SyncError {
    fn from(e: ethers::abi::Error) -> Self {
        SyncError::Decode(e.to_string())
    }
}
