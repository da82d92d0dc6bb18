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

//! Common db types and traits.

use crate::{
    ConstructionId, HintsConstruction, HintsKeyPublication, NodeId, PartyId, PreprocessedKeys,
    PreprocessingVote, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};

/// Rejections of the writable hinTS store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown construction #{0}")]
    UnknownConstruction(ConstructionId),
    #[error("preprocessing start time of construction #{0} is already set")]
    PreprocessingStartTimeAlreadySet(ConstructionId),
    #[error("hints scheme of construction #{0} is already set")]
    HintsSchemeAlreadySet(ConstructionId),
}

impl StoreError {
    /// Whether the error is a rejected second write of a write-once field.
    pub fn is_write_once_violation(&self) -> bool {
        matches!(
            self,
            Self::PreprocessingStartTimeAlreadySet(_) | Self::HintsSchemeAlreadySet(_)
        )
    }
}

#[auto_impl::auto_impl(&, Box, Arc)]
pub trait HintsStorageRO {
    fn construction(&self, construction_id: ConstructionId) -> Option<HintsConstruction>;

    /// Construction whose key material currently signs for the network.
    fn active_construction(&self) -> Option<HintsConstruction>;

    /// Construction being prepared for the next roster, if any.
    fn next_construction(&self) -> Option<HintsConstruction>;

    /// Publications of the given target nodes for the given party count,
    /// in adoption order.
    fn hints_key_publications(
        &self,
        target_node_ids: &BTreeSet<NodeId>,
        num_parties: u32,
    ) -> Vec<HintsKeyPublication>;

    /// Votes of the given source nodes for the construction.
    fn preprocessing_votes(
        &self,
        construction_id: ConstructionId,
        source_node_ids: &BTreeSet<NodeId>,
    ) -> BTreeMap<NodeId, PreprocessingVote>;
}

#[auto_impl::auto_impl(&, Box, Arc)]
pub trait HintsStorageRW: HintsStorageRO {
    /// Inserts or replaces a construction record.
    fn set_construction(&self, construction: HintsConstruction);

    fn set_active_construction(&self, construction_id: ConstructionId);

    fn set_next_construction(&self, construction_id: Option<ConstructionId>);

    /// Records a publication, replacing the node's earlier one for the same party count.
    /// Returns `false` if the stored publication was adopted at the same time or later.
    fn add_hints_key_publication(&self, publication: HintsKeyPublication) -> bool;

    /// Records a vote. Returns `false` if the node already voted for this construction.
    fn add_preprocessing_vote(
        &self,
        construction_id: ConstructionId,
        node_id: NodeId,
        vote: PreprocessingVote,
    ) -> bool;

    /// Sets the write-once preprocessing start time.
    fn set_preprocessing_start_time(
        &self,
        construction_id: ConstructionId,
        time: Timestamp,
    ) -> Result<HintsConstruction, StoreError>;

    /// Sets the write-once hints scheme of a construction.
    fn set_hints_scheme(
        &self,
        construction_id: ConstructionId,
        preprocessed_keys: PreprocessedKeys,
        node_party_ids: BTreeMap<NodeId, PartyId>,
    ) -> Result<HintsConstruction, StoreError>;
}
