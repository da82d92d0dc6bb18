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

//! Registry holding the single controller of the node.

use crate::controller::{
    ActiveHintsController, ControllerCore, HintsController, InertHintsController,
};
use anyhow::Result;
use hints_common::{
    ConstructionId, HintsConstruction, PreprocessingVote, RosterTransitionWeights,
    db::HintsStorageRW,
};

/// Owns at most one controller; asking for another construction retires the current one.
pub struct HintsControllers<DB> {
    core: ControllerCore<DB>,
    current: Option<HintsController<DB>>,
}

impl<DB: HintsStorageRW + Clone> HintsControllers<DB> {
    pub fn new(core: ControllerCore<DB>) -> Self {
        Self {
            core,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&HintsController<DB>> {
        self.current.as_ref()
    }

    /// Controller for the construction, created from the store contents if the
    /// current one belongs to another construction.
    pub fn get_or_create(
        &mut self,
        construction: &HintsConstruction,
        weights: &RosterTransitionWeights,
    ) -> Result<&mut HintsController<DB>> {
        let construction_id = construction.construction_id;
        if let Some(retired) = self
            .current
            .take_if(|controller| controller.construction_id() != construction_id)
        {
            tracing::info!(
                retired = retired.construction_id(),
                construction_id,
                "Retiring hints controller"
            );
            retired.cancel_pending_work();
        }

        let controller = match self.current.take() {
            Some(controller) => controller,
            None => self.create(construction, weights)?,
        };

        Ok(self.current.insert(controller))
    }

    pub fn get_in_progress_by_id(
        &mut self,
        construction_id: ConstructionId,
    ) -> Option<&mut HintsController<DB>> {
        self.current.as_mut().filter(|controller| {
            controller.construction_id() == construction_id && controller.is_still_in_progress()
        })
    }

    pub fn get_in_progress_for_num_parties(
        &mut self,
        num_parties: u32,
    ) -> Option<&mut HintsController<DB>> {
        self.current.as_mut().filter(|controller| {
            controller.has_num_parties(num_parties) && controller.is_still_in_progress()
        })
    }

    /// Retires the current controller, if any.
    pub fn stop(&mut self) {
        if let Some(controller) = self.current.take() {
            tracing::debug!(
                construction_id = controller.construction_id(),
                "Stopping hints controller"
            );
            controller.cancel_pending_work();
        }
    }

    fn create(
        &self,
        construction: &HintsConstruction,
        weights: &RosterTransitionWeights,
    ) -> Result<HintsController<DB>> {
        let construction_id = construction.construction_id;
        if !weights.source_nodes_have_target_threshold() {
            return Ok(HintsController::Inert(InertHintsController::new(
                construction.clone(),
                weights,
            )?));
        }

        let mut controller =
            ActiveHintsController::new(self.core.clone(), construction.clone(), weights.clone())?;

        let publications = self
            .core
            .db
            .hints_key_publications(&weights.target_node_ids(), controller.num_parties());
        for publication in publications {
            let node_id = publication.node_id;
            if let Err(err) = controller.replay_hints_key_publication(publication) {
                tracing::warn!(construction_id, node_id, "Rejected stored hints key: {err:#}");
            }
        }

        // Full votes first, so that congruent ones find what they point to.
        let (full, congruent): (Vec<_>, Vec<_>) = self
            .core
            .db
            .preprocessing_votes(construction_id, &weights.source_node_ids())
            .into_iter()
            .partition(|(_, vote)| matches!(vote, PreprocessingVote::PreprocessedKeys(_)));
        let num_votes = full.len() + congruent.len();
        for (node_id, vote) in full.into_iter().chain(congruent) {
            controller.add_preprocessing_vote(node_id, vote)?;
        }

        tracing::info!(
            construction_id,
            phase = %controller.construction().phase(),
            validations = controller.num_validations(),
            votes = num_votes,
            "Created hints controller"
        );

        Ok(HintsController::Active(Box::new(controller)))
    }
}
