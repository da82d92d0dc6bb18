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

use parity_scale_codec::{Decode, Encode};
use primitive_types::H256;
use std::{collections::BTreeMap, fmt, time::Duration};

/// Identifier of a node in a roster.
pub type NodeId = u64;

/// Slot index of a node inside the fixed-size hinTS universe of a construction.
pub type PartyId = u32;

/// Externally assigned identifier of a hinTS construction.
pub type ConstructionId = u64;

/// Consensus weight of a node.
pub type Weight = u64;

/// Consensus time, nanoseconds since the UNIX epoch.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Encode,
    Decode,
    derive_more::From,
    derive_more::Into,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const MAX: Self = Self(u64::MAX);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

/// Output of the preprocessing step: one aggregation key and one verification key
/// for the whole construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct PreprocessedKeys {
    pub aggregation_key: Vec<u8>,
    pub verification_key: Vec<u8>,
}

/// Final key material of a completed construction.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct HintsScheme {
    pub preprocessed_keys: PreprocessedKeys,
    /// Party ids of every node whose key publication was accepted.
    pub node_party_ids: BTreeMap<NodeId, PartyId>,
}

/// Phase of a construction, derived from the construction record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ConstructionPhase {
    #[display("COLLECTING_KEYS")]
    CollectingKeys,
    #[display("PREPROCESSING")]
    Preprocessing,
    #[display("COMPLETE")]
    Complete,
}

/// One run of the hinTS key ceremony for a source -> target roster transition.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct HintsConstruction {
    pub construction_id: ConstructionId,
    /// Absent for the genesis construction.
    pub source_roster_hash: Option<H256>,
    pub target_roster_hash: H256,
    /// After this time the controller may stop waiting for missing keys.
    pub grace_period_end: Timestamp,
    /// Set once, when the controller stops collecting keys.
    pub preprocessing_start_time: Option<Timestamp>,
    /// Set once, when a vote group reaches the source weight threshold.
    pub hints_scheme: Option<HintsScheme>,
}

impl HintsConstruction {
    pub fn new(
        construction_id: ConstructionId,
        source_roster_hash: Option<H256>,
        target_roster_hash: H256,
        grace_period_end: Timestamp,
    ) -> Self {
        Self {
            construction_id,
            source_roster_hash,
            target_roster_hash,
            grace_period_end,
            preprocessing_start_time: None,
            hints_scheme: None,
        }
    }

    pub fn phase(&self) -> ConstructionPhase {
        match (&self.hints_scheme, &self.preprocessing_start_time) {
            (Some(_), _) => ConstructionPhase::Complete,
            (None, Some(_)) => ConstructionPhase::Preprocessing,
            (None, None) => ConstructionPhase::CollectingKeys,
        }
    }

    pub fn has_preprocessing_start_time(&self) -> bool {
        self.preprocessing_start_time.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.hints_scheme.is_some()
    }

    pub fn preprocessed_keys(&self) -> Option<&PreprocessedKeys> {
        self.hints_scheme
            .as_ref()
            .map(|scheme| &scheme.preprocessed_keys)
    }
}

/// A hinTS key published by a node for a given party count.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct HintsKeyPublication {
    pub node_id: NodeId,
    /// Party id the node claims for itself.
    pub party_id: PartyId,
    pub num_parties: u32,
    pub hints_key: Vec<u8>,
    /// Consensus time at which the network adopted the publication.
    pub adoption_time: Timestamp,
}

/// A node's vote for the output of the preprocessing step.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum PreprocessingVote {
    /// Full preprocessed keys computed by the voter.
    PreprocessedKeys(PreprocessedKeys),
    /// "Same output as this node", without re-sending the keys.
    CongruentNode(NodeId),
}
