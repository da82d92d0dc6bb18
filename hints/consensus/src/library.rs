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

//! Seam to the pairing-based cryptography of the hinTS scheme.

use anyhow::Result;
use hints_common::{PartyId, PreprocessedKeys, Weight};
use std::collections::BTreeMap;

/// BLS key pair of this node. The private key never shows up in logs.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct BlsKeyPair {
    public_key: Vec<u8>,
    #[debug(skip)]
    private_key: Vec<u8>,
}

impl BlsKeyPair {
    pub fn new(public_key: Vec<u8>, private_key: Vec<u8>) -> Self {
        Self {
            public_key,
            private_key,
        }
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

/// Cryptographic operations of the hinTS scheme.
///
/// Implementations must be deterministic: every node computing the same
/// operation over the same inputs obtains byte-identical outputs.
pub trait HintsLibrary: Send + Sync {
    fn new_bls_key_pair(&self) -> BlsKeyPair;

    /// Hints for the given party slot, to be published as this node's hinTS key.
    fn compute_hints(&self, private_key: &[u8], party_id: PartyId, num_parties: u32)
    -> Result<Vec<u8>>;

    fn validate_hints_key(&self, hints_key: &[u8], party_id: PartyId, num_parties: u32) -> bool;

    /// Aggregates valid hinTS keys into the construction's aggregation and verification keys.
    fn preprocess(
        &self,
        hints_keys: &BTreeMap<PartyId, Vec<u8>>,
        weights: &BTreeMap<PartyId, Weight>,
        num_parties: u32,
    ) -> Result<PreprocessedKeys>;

    fn sign_bls(&self, message: &[u8], private_key: &[u8]) -> Vec<u8>;

    fn verify_bls(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> bool;

    fn aggregate_signatures(
        &self,
        aggregation_key: &[u8],
        verification_key: &[u8],
        signatures: &BTreeMap<PartyId, Vec<u8>>,
    ) -> Result<Vec<u8>>;

    fn extract_public_key(&self, aggregation_key: &[u8], party_id: PartyId) -> Option<Vec<u8>>;

    fn extract_weight(&self, aggregation_key: &[u8], party_id: PartyId) -> Option<Weight>;

    fn extract_total_weight(&self, verification_key: &[u8]) -> Result<Weight>;

    /// Whether the aggregate carries at least `threshold_weight` of valid signatures.
    fn verify_aggregate(
        &self,
        signature: &[u8],
        message: &[u8],
        verification_key: &[u8],
        threshold_weight: Weight,
    ) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_key_is_hidden_from_debug() {
        let key_pair = BlsKeyPair::new(vec![1, 2], vec![0xaa, 0xbb]);
        let debug = format!("{key_pair:?}");
        assert!(debug.contains("public_key"));
        assert!(!debug.contains("private_key"));
        assert!(!debug.contains("170"));
    }
}
