// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! ABI definitions and decoding of the StarkEx events the collectors read

use crate::chain_syncer::common::{SyncError, SyncResult};
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, Log, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

/// A Solidity event identified by its canonical signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSignature {
    pub name: &'static str,
    pub signature: &'static str,
}

impl EventSignature {
    pub fn topic(&self) -> H256 {
        H256::from(keccak256(self.signature.as_bytes()))
    }

    pub fn matches(&self, log: &Log) -> bool {
        log.topics.first() == Some(&self.topic())
    }
}

pub const LOG_STATE_TRANSITION_FACT: EventSignature = EventSignature {
    name: "LogStateTransitionFact",
    signature: "LogStateTransitionFact(bytes32)",
};

/// State update of perpetual deployments
pub const LOG_UPDATE_STATE: EventSignature = EventSignature {
    name: "LogUpdateState",
    signature: "LogUpdateState(uint256,uint256)",
};

/// State update of spot deployments
pub const LOG_ROOT_UPDATE: EventSignature = EventSignature {
    name: "LogRootUpdate",
    signature: "LogRootUpdate(uint256,uint256,uint256,uint256,uint256)",
};

pub const IMPLEMENTATION_ADDED: EventSignature = EventSignature {
    name: "ImplementationAdded",
    signature: "ImplementationAdded(address,bytes,bool)",
};

pub const UPGRADED: EventSignature = EventSignature {
    name: "Upgraded",
    signature: "Upgraded(address)",
};

/// Which state update event a deployment emits next to each fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateEventKind {
    UpdateState,
    RootUpdate,
}

impl UpdateEventKind {
    pub fn signature(&self) -> EventSignature {
        match self {
            UpdateEventKind::UpdateState => LOG_UPDATE_STATE,
            UpdateEventKind::RootUpdate => LOG_ROOT_UPDATE,
        }
    }
}

/// Decoded fact or state update event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEventArgs {
    Fact {
        state_transition_fact: H256,
    },
    UpdateState {
        sequence_number: u64,
        batch_id: u64,
    },
    RootUpdate {
        sequence_number: u64,
        batch_id: u64,
        validium_vault_root: U256,
        rollup_vault_root: U256,
        order_root: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransitionEvent {
    pub block_number: u64,
    pub tx_hash: H256,
    pub args: TransitionEventArgs,
}

impl RawTransitionEvent {
    pub fn name(&self) -> &'static str {
        match self.args {
            TransitionEventArgs::Fact { .. } => LOG_STATE_TRANSITION_FACT.name,
            TransitionEventArgs::UpdateState { .. } => LOG_UPDATE_STATE.name,
            TransitionEventArgs::RootUpdate { .. } => LOG_ROOT_UPDATE.name,
        }
    }

    /// Decodes a fact log, or an update log of the `update` kind
    pub fn try_from_log(log: &Log, update: UpdateEventKind) -> SyncResult<Self> {
        let (block_number, tx_hash) = log_position(log)?;
        let args = if LOG_STATE_TRANSITION_FACT.matches(log) {
            let tokens = abi::decode(&[ParamType::FixedBytes(32)], &log.data)?;
            TransitionEventArgs::Fact {
                state_transition_fact: H256::from_slice(&fixed_bytes(&tokens[0])?),
            }
        } else if update.signature().matches(log) {
            decode_update(log, update)?
        } else {
            return Err(SyncError::Decode(format!(
                "Unexpected event with topics {:?} in tx {:?}",
                log.topics, tx_hash
            )));
        };
        Ok(Self {
            block_number,
            tx_hash,
            args,
        })
    }
}

fn decode_update(log: &Log, update: UpdateEventKind) -> SyncResult<TransitionEventArgs> {
    match update {
        UpdateEventKind::UpdateState => {
            let tokens = abi::decode(&[ParamType::Uint(256), ParamType::Uint(256)], &log.data)?;
            Ok(TransitionEventArgs::UpdateState {
                sequence_number: uint_u64(&tokens[0])?,
                batch_id: uint_u64(&tokens[1])?,
            })
        }
        UpdateEventKind::RootUpdate => {
            let tokens = abi::decode(&vec![ParamType::Uint(256); 5], &log.data)?;
            Ok(TransitionEventArgs::RootUpdate {
                sequence_number: uint_u64(&tokens[0])?,
                batch_id: uint_u64(&tokens[1])?,
                validium_vault_root: uint(&tokens[2])?,
                rollup_vault_root: uint(&tokens[3])?,
                order_root: uint(&tokens[4])?,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifierEventName {
    ImplementationAdded,
    Upgraded,
}

/// Proxy event relevant for verifier resolution. Persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierEventRecord {
    pub name: VerifierEventName,
    pub block_number: u64,
    pub implementation: Address,
    /// Only set for `ImplementationAdded`
    pub initializer: Option<Bytes>,
}

impl VerifierEventRecord {
    pub fn try_from_log(log: &Log) -> SyncResult<Self> {
        let (block_number, _) = log_position(log)?;
        let implementation = log
            .topics
            .get(1)
            .map(|topic| Address::from(*topic))
            .ok_or_else(|| SyncError::Decode("Missing indexed implementation".to_string()))?;

        if IMPLEMENTATION_ADDED.matches(log) {
            let tokens = abi::decode(&[ParamType::Bytes, ParamType::Bool], &log.data)?;
            let initializer = match &tokens[0] {
                Token::Bytes(bytes) => Bytes::from(bytes.clone()),
                other => {
                    return Err(SyncError::Decode(format!(
                        "Expected bytes initializer, got {:?}",
                        other
                    )))
                }
            };
            Ok(Self {
                name: VerifierEventName::ImplementationAdded,
                block_number,
                implementation,
                initializer: Some(initializer),
            })
        } else if UPGRADED.matches(log) {
            Ok(Self {
                name: VerifierEventName::Upgraded,
                block_number,
                implementation,
                initializer: None,
            })
        } else {
            Err(SyncError::Decode(format!(
                "Unexpected proxy event with topics {:?}",
                log.topics
            )))
        }
    }
}

fn log_position(log: &Log) -> SyncResult<(u64, H256)> {
    let block_number = log
        .block_number
        .ok_or_else(|| {
            SyncError::InvalidResponse("Provider returns log without block_number".into())
        })?
        .as_u64();
    let tx_hash = log.transaction_hash.ok_or_else(|| {
        SyncError::InvalidResponse("Provider returns log without transaction_hash".into())
    })?;
    Ok((block_number, tx_hash))
}

fn fixed_bytes(token: &Token) -> SyncResult<Vec<u8>> {
    match token {
        Token::FixedBytes(bytes) => Ok(bytes.clone()),
        other => Err(SyncError::Decode(format!("Expected bytes32, got {:?}", other))),
    }
}

fn uint(token: &Token) -> SyncResult<U256> {
    match token {
        Token::Uint(value) => Ok(*value),
        other => Err(SyncError::Decode(format!("Expected uint256, got {:?}", other))),
    }
}

fn uint_u64(token: &Token) -> SyncResult<u64> {
    let value = uint(token)?;
    if value > U256::from(u64::MAX) {
        return Err(SyncError::Decode(format!("{} does not fit into u64", value)));
    }
    Ok(value.as_u64())
}
