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

//! Test doubles for the cryptographic library and the transaction submitter.

use crate::{
    config::SigningThreshold,
    context::HintsContext,
    controller::ControllerCore,
    library::{BlsKeyPair, HintsLibrary},
    submissions::{HintsSubmissions, HintsTransaction, TransactionSubmitter},
    tasks::{TaskWatch, WorkerPool},
};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use hints_common::{
    ConstructionId, HintsConstruction, HintsKeyPublication, NodeId, PartyId, PreprocessedKeys,
    Timestamp, Weight, db::HintsStorageRW, mock::Mock,
};
use hints_db::Database;
use parity_scale_codec::{Decode, Encode};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};
use tracing_subscriber::EnvFilter;

/// Waits for every watched task, whatever its outcome.
pub async fn settle(watches: Vec<TaskWatch>) {
    for watch in watches {
        let _ = watch.join().await;
    }
}

/// In-memory node environment shared by controller and service tests.
pub struct TestEnv {
    pub db: Database,
    pub library: Arc<FakeHintsLibrary>,
    pub submitter: MockSubmitter,
    pub context: HintsContext,
}

impl TestEnv {
    pub fn new() -> Self {
        init_logger();

        let library = Arc::new(FakeHintsLibrary::default());
        Self {
            db: Database::memory(),
            context: HintsContext::new(library.clone(), SigningThreshold::OneThird),
            library,
            submitter: MockSubmitter::default(),
        }
    }

    /// Stores a fresh construction and returns it.
    pub fn construction(
        &self,
        construction_id: ConstructionId,
        grace_period_end: Timestamp,
    ) -> HintsConstruction {
        let construction = HintsConstruction::mock((construction_id, grace_period_end));
        self.db.set_construction(construction.clone());
        construction
    }

    /// Preprocessed keys every honest node computes from valid keys of `nodes`,
    /// where node `i` holds party `i` with weight `weights[i]`.
    pub fn expected_keys(&self, weights: &[Weight], nodes: &[NodeId]) -> PreprocessedKeys {
        let num_parties = crate::party::party_size_for_roster_node_count(weights.len()).unwrap();
        let hints_keys = nodes
            .iter()
            .map(|node_id| {
                let publication = self.library.publication(
                    *node_id,
                    *node_id as PartyId,
                    num_parties,
                    Timestamp::MAX,
                );
                (*node_id as PartyId, publication.hints_key)
            })
            .collect();
        let party_weights = nodes
            .iter()
            .map(|node_id| (*node_id as PartyId, weights[*node_id as usize]))
            .collect();
        self.library
            .preprocess(&hints_keys, &party_weights, num_parties)
            .unwrap()
    }

    pub fn core(&self, self_id: NodeId) -> ControllerCore<Database> {
        ControllerCore {
            self_id,
            db: self.db.clone(),
            library: self.library.clone(),
            pool: WorkerPool::current(),
            submissions: HintsSubmissions::new(Arc::new(self.submitter.clone())),
            context: self.context.clone(),
            key_pair: FakeHintsLibrary::key_pair(self_id),
        }
    }
}

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Encode, Decode)]
struct FakeHints {
    party_id: PartyId,
    num_parties: u32,
    public_key: Vec<u8>,
}

#[derive(Encode, Decode)]
struct FakeAggregationKey {
    parties: BTreeMap<PartyId, (Vec<u8>, Weight)>,
}

#[derive(Encode, Decode)]
struct FakeVerificationKey {
    total_weight: Weight,
    num_parties: u32,
    parties: BTreeMap<PartyId, (Vec<u8>, Weight)>,
}

/// Deterministic stand-in for the hinTS library: keys and signatures are plain
/// SCALE-encoded structures, so any two instances agree on every output.
#[derive(Debug, Default)]
pub struct FakeHintsLibrary {
    next_key: AtomicU64,
    fail_preprocess: AtomicBool,
    aggregations: AtomicUsize,
}

impl FakeHintsLibrary {
    pub fn key_pair(seed: u64) -> BlsKeyPair {
        let bytes = seed.to_le_bytes();
        BlsKeyPair::new(
            [&[1u8][..], &bytes].concat(),
            [&[0u8][..], &bytes].concat(),
        )
    }

    pub fn fail_preprocess(&self, fail: bool) {
        self.fail_preprocess.store(fail, Ordering::SeqCst);
    }

    pub fn aggregations(&self) -> usize {
        self.aggregations.load(Ordering::SeqCst)
    }

    /// Publication of a valid hinTS key for the node, signed with `key_pair(node_id)`.
    pub fn publication(
        &self,
        node_id: NodeId,
        party_id: PartyId,
        num_parties: u32,
        adoption_time: Timestamp,
    ) -> HintsKeyPublication {
        let key_pair = Self::key_pair(node_id);
        HintsKeyPublication {
            node_id,
            party_id,
            num_parties,
            hints_key: self
                .compute_hints(key_pair.private_key(), party_id, num_parties)
                .expect("valid private key"),
            adoption_time,
        }
    }

    fn public_key_of(private_key: &[u8]) -> Result<Vec<u8>> {
        match private_key.split_first() {
            Some((0, rest)) => Ok([&[1u8][..], rest].concat()),
            _ => Err(anyhow!("malformed private key")),
        }
    }

    fn parties(
        hints_keys: &BTreeMap<PartyId, Vec<u8>>,
        weights: &BTreeMap<PartyId, Weight>,
    ) -> Result<BTreeMap<PartyId, (Vec<u8>, Weight)>> {
        hints_keys
            .iter()
            .map(|(party_id, hints_key)| {
                let hints = FakeHints::decode(&mut hints_key.as_slice())?;
                let weight = weights.get(party_id).copied().unwrap_or_default();
                Ok::<_, anyhow::Error>((*party_id, (hints.public_key, weight)))
            })
            .collect()
    }
}

impl HintsLibrary for FakeHintsLibrary {
    fn new_bls_key_pair(&self) -> BlsKeyPair {
        Self::key_pair(self.next_key.fetch_add(1, Ordering::SeqCst))
    }

    fn compute_hints(
        &self,
        private_key: &[u8],
        party_id: PartyId,
        num_parties: u32,
    ) -> Result<Vec<u8>> {
        Ok(FakeHints {
            party_id,
            num_parties,
            public_key: Self::public_key_of(private_key)?,
        }
        .encode())
    }

    fn validate_hints_key(&self, hints_key: &[u8], party_id: PartyId, num_parties: u32) -> bool {
        FakeHints::decode(&mut &hints_key[..]).is_ok_and(|hints| {
            hints.party_id == party_id && hints.num_parties == num_parties
        })
    }

    fn preprocess(
        &self,
        hints_keys: &BTreeMap<PartyId, Vec<u8>>,
        weights: &BTreeMap<PartyId, Weight>,
        num_parties: u32,
    ) -> Result<PreprocessedKeys> {
        if self.fail_preprocess.load(Ordering::SeqCst) {
            bail!("preprocessing failed");
        }

        let parties = Self::parties(hints_keys, weights)?;
        let total_weight = parties.values().map(|(_, weight)| *weight).sum();
        Ok(PreprocessedKeys {
            aggregation_key: FakeAggregationKey {
                parties: parties.clone(),
            }
            .encode(),
            verification_key: FakeVerificationKey {
                total_weight,
                num_parties,
                parties,
            }
            .encode(),
        })
    }

    fn sign_bls(&self, message: &[u8], private_key: &[u8]) -> Vec<u8> {
        let public_key = Self::public_key_of(private_key).unwrap_or_default();
        (public_key, message.to_vec()).encode()
    }

    fn verify_bls(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> bool {
        signature == (public_key.to_vec(), message.to_vec()).encode().as_slice()
    }

    fn aggregate_signatures(
        &self,
        _aggregation_key: &[u8],
        _verification_key: &[u8],
        signatures: &BTreeMap<PartyId, Vec<u8>>,
    ) -> Result<Vec<u8>> {
        self.aggregations.fetch_add(1, Ordering::SeqCst);
        Ok(signatures.encode())
    }

    fn extract_public_key(&self, aggregation_key: &[u8], party_id: PartyId) -> Option<Vec<u8>> {
        let key = FakeAggregationKey::decode(&mut &aggregation_key[..]).ok()?;
        key.parties.get(&party_id).map(|(public_key, _)| public_key.clone())
    }

    fn extract_weight(&self, aggregation_key: &[u8], party_id: PartyId) -> Option<Weight> {
        let key = FakeAggregationKey::decode(&mut &aggregation_key[..]).ok()?;
        key.parties.get(&party_id).map(|(_, weight)| *weight)
    }

    fn extract_total_weight(&self, verification_key: &[u8]) -> Result<Weight> {
        Ok(FakeVerificationKey::decode(&mut &verification_key[..])?.total_weight)
    }

    fn verify_aggregate(
        &self,
        signature: &[u8],
        message: &[u8],
        verification_key: &[u8],
        threshold_weight: Weight,
    ) -> bool {
        let (Ok(key), Ok(signatures)) = (
            FakeVerificationKey::decode(&mut &verification_key[..]),
            BTreeMap::<PartyId, Vec<u8>>::decode(&mut &signature[..]),
        ) else {
            return false;
        };

        let weight: Weight = signatures
            .iter()
            .filter_map(|(party_id, signature)| {
                let (public_key, weight) = key.parties.get(party_id)?;
                self.verify_bls(signature, message, public_key)
                    .then_some(*weight)
            })
            .sum();
        weight >= threshold_weight
    }
}

#[derive(Debug, Default)]
struct MockSubmitterState {
    transactions: Vec<HintsTransaction>,
    attempts: usize,
    fail: bool,
}

/// Records every submitted transaction.
#[derive(Debug, Clone, Default)]
pub struct MockSubmitter {
    state: Arc<Mutex<MockSubmitterState>>,
}

impl MockSubmitter {
    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().fail = fail;
    }

    pub fn transactions(&self) -> Vec<HintsTransaction> {
        self.state.lock().transactions.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }
}

#[async_trait]
impl TransactionSubmitter for MockSubmitter {
    async fn submit(&self, transaction: HintsTransaction) -> Result<()> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.fail {
            bail!("submission rejected");
        }
        state.transactions.push(transaction);
        Ok(())
    }
}
