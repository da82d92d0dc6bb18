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

//! Controllers driving one hinTS construction each.

use crate::{
    context::HintsContext,
    library::{BlsKeyPair, HintsLibrary},
    submissions::HintsSubmissions,
    tasks::{TaskWatch, WorkerPool},
};
use anyhow::Result;
use hints_common::{
    ConstructionId, ConstructionPhase, HintsConstruction, HintsKeyPublication, NodeId, PartyId,
    PreprocessingVote, Timestamp, db::HintsStorageRW,
};
use std::sync::Arc;

pub use active::ActiveHintsController;
pub use inert::InertHintsController;

mod active;
mod inert;

/// Collaborators shared by every controller of the node.
#[derive(Clone)]
pub struct ControllerCore<DB> {
    pub self_id: NodeId,
    pub db: DB,
    pub library: Arc<dyn HintsLibrary>,
    pub pool: WorkerPool,
    pub submissions: HintsSubmissions,
    pub context: HintsContext,
    pub key_pair: BlsKeyPair,
}

/// Controller of the in-progress construction.
///
/// The inert variant is installed when the source roster cannot reach a
/// deterministic conclusion: it never advances and never completes.
#[derive(derive_more::IsVariant)]
pub enum HintsController<DB> {
    Active(Box<ActiveHintsController<DB>>),
    Inert(InertHintsController),
}

impl<DB: HintsStorageRW + Clone> HintsController<DB> {
    pub fn construction(&self) -> &HintsConstruction {
        match self {
            Self::Active(controller) => controller.construction(),
            Self::Inert(controller) => controller.construction(),
        }
    }

    pub fn construction_id(&self) -> ConstructionId {
        self.construction().construction_id
    }

    pub fn phase(&self) -> ConstructionPhase {
        self.construction().phase()
    }

    pub fn num_parties(&self) -> u32 {
        match self {
            Self::Active(controller) => controller.num_parties(),
            Self::Inert(controller) => controller.num_parties(),
        }
    }

    pub fn has_num_parties(&self, num_parties: u32) -> bool {
        self.num_parties() == num_parties
    }

    pub fn is_still_in_progress(&self) -> bool {
        !self.construction().is_complete()
    }

    pub fn party_id_of(&self, node_id: NodeId) -> Option<PartyId> {
        match self {
            Self::Active(controller) => controller.party_id_of(node_id),
            Self::Inert(_) => None,
        }
    }

    /// Moves the construction forward; called once per round.
    pub fn advance_construction(&mut self, now: Timestamp) -> Result<()> {
        match self {
            Self::Active(controller) => controller.advance_construction(now),
            Self::Inert(_) => Ok(()),
        }
    }

    pub fn add_hints_key_publication(&mut self, publication: HintsKeyPublication) -> Result<bool> {
        match self {
            Self::Active(controller) => controller.add_hints_key_publication(publication),
            Self::Inert(_) => Ok(false),
        }
    }

    pub fn add_preprocessing_vote(
        &mut self,
        node_id: NodeId,
        vote: PreprocessingVote,
    ) -> Result<bool> {
        match self {
            Self::Active(controller) => controller.add_preprocessing_vote(node_id, vote),
            Self::Inert(_) => Ok(false),
        }
    }

    pub fn cancel_pending_work(&self) {
        if let Self::Active(controller) = self {
            controller.cancel_pending_work();
        }
    }

    pub fn pending_work(&self) -> Vec<TaskWatch> {
        match self {
            Self::Active(controller) => controller.pending_work(),
            Self::Inert(_) => Vec::new(),
        }
    }
}
