// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! State transitions from paired fact/update events
//!
//! Every state transition emits a `LogStateTransitionFact` immediately
//! followed by a state update event in the same transaction. Perpetual
//! deployments emit `LogUpdateState`, spot deployments `LogRootUpdate`.

use super::events::{
    RawTransitionEvent, TransitionEventArgs, UpdateEventKind, LOG_STATE_TRANSITION_FACT,
};
use crate::chain_syncer::common::{BlockRange, SyncError, SyncResult};
use crate::chain_syncer::eth::{LogRangeClient, LogSource};
use crate::storage::{StateTransitionRecord, StateTransitionRepository};
use ethers::types::{Address, Filter, H256};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub block_number: u64,
    pub tx_hash: H256,
    pub state_transition_hash: H256,
    pub sequence_number: u64,
    pub batch_id: u64,
}

impl StateTransition {
    pub fn record(&self) -> StateTransitionRecord {
        StateTransitionRecord {
            block_number: self.block_number,
            state_transition_hash: self.state_transition_hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedEventConfig {
    pub contract: Address,
    pub update_event: UpdateEventKind,
}

pub struct PairedEventCollector<S> {
    client: LogRangeClient<S>,
    repository: Arc<StateTransitionRepository>,
    config: PairedEventConfig,
}

impl<S: LogSource> PairedEventCollector<S> {
    pub fn new(
        client: LogRangeClient<S>,
        repository: Arc<StateTransitionRepository>,
        config: PairedEventConfig,
    ) -> Self {
        Self {
            client,
            repository,
            config,
        }
    }

    pub fn filter(&self) -> Filter {
        Filter::new().address(self.config.contract).topic0(vec![
            LOG_STATE_TRANSITION_FACT.topic(),
            self.config.update_event.signature().topic(),
        ])
    }

    pub async fn collect(&self, range: &BlockRange) -> SyncResult<Vec<StateTransition>> {
        let logs = self.client.get_logs_in_range(range, &self.filter()).await?;
        let events = logs
            .iter()
            .map(|log| RawTransitionEvent::try_from_log(log, self.config.update_event))
            .collect::<SyncResult<Vec<_>>>()?;

        let transitions = pair_transitions(&events, self.config.update_event)?;
        self.repository
            .add_many(transitions.iter().map(StateTransition::record).collect())
            .await?;
        debug!(
            "[PairedEventCollector] Collected {} state transitions in blocks [{}, {})",
            transitions.len(),
            range.start(),
            range.end()
        );
        Ok(transitions)
    }

    pub async fn discard_after(&self, block_number: u64) -> SyncResult<()> {
        let deleted = self.repository.delete_after(block_number).await?;
        debug!(
            "[PairedEventCollector] Discarded {} state transitions after block {}",
            deleted, block_number
        );
        Ok(())
    }
}

/// Builds one transition from each consecutive (fact, update) pair
pub fn pair_transitions(
    events: &[RawTransitionEvent],
    update: UpdateEventKind,
) -> SyncResult<Vec<StateTransition>> {
    if events.len() % 2 != 0 {
        return Err(SyncError::UnpairedEvent(events.len()));
    }

    events
        .chunks_exact(2)
        .map(|pair| {
            let (fact, update_event) = (&pair[0], &pair[1]);
            let TransitionEventArgs::Fact {
                state_transition_fact,
            } = fact.args
            else {
                return Err(SyncError::MismatchedTransition(format!(
                    "Expected {} in tx {:?}, got {}",
                    LOG_STATE_TRANSITION_FACT.name,
                    fact.tx_hash,
                    fact.name()
                )));
            };
            let (sequence_number, batch_id) = match (update, &update_event.args) {
                (
                    UpdateEventKind::UpdateState,
                    TransitionEventArgs::UpdateState {
                        sequence_number,
                        batch_id,
                    },
                )
                | (
                    UpdateEventKind::RootUpdate,
                    TransitionEventArgs::RootUpdate {
                        sequence_number,
                        batch_id,
                        ..
                    },
                ) => (*sequence_number, *batch_id),
                _ => {
                    return Err(SyncError::MismatchedTransition(format!(
                        "Expected {} in tx {:?}, got {}",
                        update.signature().name,
                        update_event.tx_hash,
                        update_event.name()
                    )))
                }
            };
            if fact.tx_hash != update_event.tx_hash {
                return Err(SyncError::MismatchedTransition(format!(
                    "State transition fact in tx {:?} and state update in tx {:?} are not from the same transaction",
                    fact.tx_hash, update_event.tx_hash
                )));
            }
            Ok(StateTransition {
                block_number: update_event.block_number,
                tx_hash: update_event.tx_hash,
                state_transition_hash: state_transition_fact,
                sequence_number,
                batch_id,
            })
        })
        .collect()
}
