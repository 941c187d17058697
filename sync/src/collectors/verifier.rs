// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Verifier addresses from proxy upgrade events
//!
//! The verifier proxy emits `ImplementationAdded` with an initializer holding
//! the verifier address, and later `Upgraded` when that implementation goes
//! live. Only implementations that were actually upgraded to count.

use super::events::{VerifierEventName, VerifierEventRecord, IMPLEMENTATION_ADDED, UPGRADED};
use crate::chain_syncer::common::{BlockRange, SyncResult};
use crate::chain_syncer::eth::{LogRangeClient, LogSource};
use crate::storage::VerifierEventRepository;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Filter};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct VerifierAddressResolver<S> {
    client: LogRangeClient<S>,
    repository: Arc<VerifierEventRepository>,
    proxy: Address,
    hardcoded: Vec<Address>,
}

impl<S: LogSource> VerifierAddressResolver<S> {
    pub fn new(
        client: LogRangeClient<S>,
        repository: Arc<VerifierEventRepository>,
        proxy: Address,
        hardcoded: Vec<Address>,
    ) -> Self {
        Self {
            client,
            repository,
            proxy,
            hardcoded,
        }
    }

    /// Stores the proxy events found in `range` and returns the verifier
    /// addresses derived from all stored events, followed by the hardcoded ones.
    pub async fn collect(&self, range: &BlockRange) -> SyncResult<Vec<Address>> {
        let old_events = self.repository.get_all().await?;
        let new_events = self.get_events(range).await?;
        self.repository.add_many(new_events.clone()).await?;

        let (upgraded, mut added): (Vec<_>, Vec<_>) = old_events
            .into_iter()
            .chain(new_events)
            .partition(|e| e.name == VerifierEventName::Upgraded);
        // stable, so equal blocks keep their log order
        added.sort_by(|a, b| b.block_number.cmp(&a.block_number));

        let mut verifiers = verifiers_from_events(&added, &upgraded);
        verifiers.extend(self.hardcoded.iter().copied());
        let verifiers = dedup_preserving_order(verifiers);
        debug!(
            "[VerifierAddressResolver] Resolved {} verifiers up to block {}",
            verifiers.len(),
            range.end().saturating_sub(1)
        );
        Ok(verifiers)
    }

    pub async fn discard_after(&self, block_number: u64) -> SyncResult<()> {
        let deleted = self.repository.delete_after(block_number).await?;
        debug!(
            "[VerifierAddressResolver] Discarded {} verifier events after block {}",
            deleted, block_number
        );
        Ok(())
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .address(self.proxy)
            .topic0(vec![IMPLEMENTATION_ADDED.topic(), UPGRADED.topic()])
    }

    async fn get_events(&self, range: &BlockRange) -> SyncResult<Vec<VerifierEventRecord>> {
        let logs = self.client.get_logs_in_range(range, &self.filter()).await?;
        logs.iter().map(VerifierEventRecord::try_from_log).collect()
    }
}

/// For every `Upgraded` event take the closest preceding `ImplementationAdded`
/// of the same implementation. `added` must be sorted by block descending.
fn verifiers_from_events(
    added: &[VerifierEventRecord],
    upgraded: &[VerifierEventRecord],
) -> Vec<Address> {
    upgraded
        .iter()
        .filter_map(|u| {
            added
                .iter()
                .find(|a| a.implementation == u.implementation && a.block_number <= u.block_number)
        })
        .filter_map(|a| {
            let initializer = a.initializer.as_ref()?;
            match decode_address(initializer) {
                Some(address) => Some(address),
                None => {
                    warn!(
                        "[VerifierAddressResolver] Cannot decode initializer of implementation {:?} at block {}",
                        a.implementation, a.block_number
                    );
                    None
                }
            }
        })
        .collect()
}

fn decode_address(data: &[u8]) -> Option<Address> {
    match abi::decode(&[ParamType::Address], data).ok()?.first()? {
        Token::Address(address) => Some(*address),
        _ => None,
    }
}

fn dedup_preserving_order(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = std::collections::HashSet::new();
    addresses.into_iter().filter(|a| seen.insert(*a)).collect()
}
