// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Accumulation of partial signatures into one aggregate signature.

use crate::{
    context::ReadyConstruction,
    library::HintsLibrary,
    tasks::{TaskError, TaskResult},
};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use hints_common::{ConstructionId, NodeId, PartyId, Weight};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct Accumulator {
    signatures: BTreeMap<PartyId, Vec<u8>>,
    weight: Weight,
}

struct SigningInner {
    library: Arc<dyn HintsLibrary>,
    ready: Arc<ReadyConstruction>,
    threshold_weight: Weight,
    message: Vec<u8>,
    accumulator: Mutex<Accumulator>,
    completed: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<TaskResult<Vec<u8>>>>>,
    aggregate: Shared<BoxFuture<'static, TaskResult<Vec<u8>>>>,
}

/// Signing of one message by the ready construction.
///
/// Clones share the same state, so partial signatures may be incorporated
/// from any number of threads.
#[derive(Clone, derive_more::Debug)]
pub struct Signing {
    #[debug(skip)]
    inner: Arc<SigningInner>,
}

impl Signing {
    pub(crate) fn new(
        library: Arc<dyn HintsLibrary>,
        ready: Arc<ReadyConstruction>,
        threshold_weight: Weight,
        message: Vec<u8>,
    ) -> Self {
        let (sender, receiver) = oneshot::channel();
        let aggregate = receiver
            .map(|received| received.unwrap_or(Err(TaskError::Cancelled)))
            .boxed()
            .shared();

        Self {
            inner: Arc::new(SigningInner {
                library,
                ready,
                threshold_weight,
                message,
                accumulator: Mutex::new(Accumulator::default()),
                completed: AtomicBool::new(false),
                sender: Mutex::new(Some(sender)),
                aggregate,
            }),
        }
    }

    pub fn construction_id(&self) -> ConstructionId {
        self.inner.ready.construction_id
    }

    pub fn message(&self) -> &[u8] {
        &self.inner.message
    }

    pub fn threshold_weight(&self) -> Weight {
        self.inner.threshold_weight
    }

    pub fn accumulated_weight(&self) -> Weight {
        self.inner.accumulator.lock().weight
    }

    /// Whether the threshold was reached and aggregation started.
    pub fn is_complete(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Resolves once with the aggregate signature.
    pub fn future(&self) -> impl Future<Output = TaskResult<Vec<u8>>> + Send + 'static + use<> {
        self.inner.aggregate.clone()
    }

    pub fn outcome(&self) -> Option<TaskResult<Vec<u8>>> {
        self.inner.aggregate.clone().now_or_never()
    }

    /// Adds a partial signature of `node_id`. Returns whether it was accepted.
    ///
    /// The call that first brings the accumulated weight to the threshold
    /// aggregates every stored signature and resolves the signing.
    pub fn incorporate(
        &self,
        construction_id: ConstructionId,
        node_id: NodeId,
        signature: Vec<u8>,
    ) -> bool {
        let inner = &self.inner;
        let ready = &inner.ready;

        if construction_id != ready.construction_id {
            tracing::debug!(
                construction_id,
                expected = ready.construction_id,
                node_id,
                "Ignoring partial signature for another construction"
            );
            return false;
        }
        let Some(party_id) = ready.node_party_ids.get(&node_id).copied() else {
            tracing::debug!(node_id, "Ignoring partial signature of node without party");
            return false;
        };
        if self.is_complete() {
            return true;
        }

        let Some(public_key) = inner
            .library
            .extract_public_key(&ready.aggregation_key, party_id)
        else {
            tracing::warn!(node_id, party_id, "No public key for party");
            return false;
        };
        if !inner
            .library
            .verify_bls(&signature, &inner.message, &public_key)
        {
            tracing::warn!(node_id, party_id, "Invalid partial signature");
            return false;
        }

        let weight = inner
            .library
            .extract_weight(&ready.aggregation_key, party_id)
            .unwrap_or(0);
        let reached = {
            let mut accumulator = inner.accumulator.lock();
            if accumulator.signatures.insert(party_id, signature).is_none() {
                accumulator.weight = accumulator.weight.saturating_add(weight);
            }
            accumulator.weight >= inner.threshold_weight
        };

        if reached && !inner.completed.swap(true, Ordering::AcqRel) {
            self.aggregate();
        }

        true
    }

    fn aggregate(&self) {
        let inner = &self.inner;
        let (signatures, weight) = {
            let accumulator = inner.accumulator.lock();
            (accumulator.signatures.clone(), accumulator.weight)
        };

        let result = inner
            .library
            .aggregate_signatures(
                &inner.ready.aggregation_key,
                &inner.ready.verification_key,
                &signatures,
            )
            .map_err(TaskError::from);
        match &result {
            Ok(_) => tracing::info!(
                construction_id = inner.ready.construction_id,
                signers = signatures.len(),
                weight,
                "Aggregated hints signature"
            ),
            Err(err) => tracing::error!(
                construction_id = inner.ready.construction_id,
                "Failed to aggregate hints signature: {err}"
            ),
        }

        if let Some(sender) = inner.sender.lock().take() {
            let _ = sender.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SigningThreshold, context::HintsContext, mock::FakeHintsLibrary};
    use hints_common::{H256, HintsConstruction, HintsScheme, Timestamp};
    use std::thread;

    const MESSAGE: &[u8] = b"block hash";

    fn ready_context(
        library: Arc<FakeHintsLibrary>,
        weights: &[Weight],
        threshold: SigningThreshold,
    ) -> HintsContext {
        let num_parties = crate::party::party_size_for_roster_node_count(weights.len()).unwrap();
        let hints_keys: BTreeMap<PartyId, Vec<u8>> = (0..weights.len() as u64)
            .map(|node_id| {
                let key_pair = FakeHintsLibrary::key_pair(node_id);
                let hints = library
                    .compute_hints(key_pair.private_key(), node_id as PartyId, num_parties)
                    .unwrap();
                (node_id as PartyId, hints)
            })
            .collect();
        let party_weights = weights
            .iter()
            .enumerate()
            .map(|(party_id, weight)| (party_id as PartyId, *weight))
            .collect();
        let keys = library
            .preprocess(&hints_keys, &party_weights, num_parties)
            .unwrap();

        let mut construction = HintsConstruction::new(1, None, H256::zero(), Timestamp::MAX);
        construction.hints_scheme = Some(HintsScheme {
            preprocessed_keys: keys,
            node_party_ids: (0..weights.len() as u64)
                .map(|node_id| (node_id, node_id as PartyId))
                .collect(),
        });

        let context = HintsContext::new(library, threshold);
        context.set_construction(&construction).unwrap();
        context
    }

    fn sign(node_id: NodeId) -> Vec<u8> {
        let key_pair = FakeHintsLibrary::key_pair(node_id);
        FakeHintsLibrary::default().sign_bls(MESSAGE, key_pair.private_key())
    }

    #[test]
    fn resolves_exactly_at_threshold() {
        let library = Arc::new(FakeHintsLibrary::default());
        let context = ready_context(library.clone(), &[1, 1, 1, 1], SigningThreshold::OneThird);
        let signing = context.new_signing(MESSAGE.to_vec()).unwrap();
        assert_eq!(signing.threshold_weight(), 2);

        assert!(signing.incorporate(1, 0, sign(0)));
        assert_eq!(signing.accumulated_weight(), 1);
        assert!(signing.outcome().is_none());

        // Same party again does not count twice.
        assert!(signing.incorporate(1, 0, sign(0)));
        assert_eq!(signing.accumulated_weight(), 1);
        assert!(!signing.is_complete());

        assert!(signing.incorporate(1, 1, sign(1)));
        assert!(signing.is_complete());
        let aggregate = signing.outcome().unwrap().unwrap();
        assert!(context.verify_aggregate(MESSAGE, &aggregate).unwrap());
        assert_eq!(library.aggregations(), 1);

        // Later signatures change nothing.
        assert!(signing.incorporate(1, 2, sign(2)));
        assert_eq!(signing.outcome().unwrap().unwrap(), aggregate);
        assert_eq!(library.aggregations(), 1);
    }

    #[test]
    fn rejects_foreign_and_invalid_signatures() {
        let library = Arc::new(FakeHintsLibrary::default());
        let context = ready_context(library, &[1, 1, 1, 1], SigningThreshold::OneThird);
        let signing = context.new_signing(MESSAGE.to_vec()).unwrap();

        assert!(!signing.incorporate(2, 0, sign(0)));
        assert!(!signing.incorporate(1, 9, sign(9)));
        assert!(!signing.incorporate(1, 0, sign(1)));
        assert_eq!(signing.accumulated_weight(), 0);
    }

    #[test]
    fn more_than_two_thirds_threshold() {
        let library = Arc::new(FakeHintsLibrary::default());
        let context = ready_context(
            library,
            &[1, 1, 1, 1],
            SigningThreshold::MoreThanTwoThirds,
        );
        let signing = context.new_signing(MESSAGE.to_vec()).unwrap();
        assert_eq!(signing.threshold_weight(), 3);

        signing.incorporate(1, 0, sign(0));
        signing.incorporate(1, 1, sign(1));
        assert!(signing.outcome().is_none());
        signing.incorporate(1, 3, sign(3));
        assert!(signing.outcome().unwrap().is_ok());
    }

    #[test]
    fn concurrent_incorporation_aggregates_once() {
        let library = Arc::new(FakeHintsLibrary::default());
        let weights = vec![1; 16];
        let context = ready_context(library.clone(), &weights, SigningThreshold::OneThird);
        let signing = context.new_signing(MESSAGE.to_vec()).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|node_id| {
                let signing = signing.clone();
                thread::spawn(move || signing.incorporate(1, node_id, sign(node_id)))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(library.aggregations(), 1);
        let aggregate = futures::executor::block_on(signing.future()).unwrap();
        assert!(context.verify_aggregate(MESSAGE, &aggregate).unwrap());
    }
}
