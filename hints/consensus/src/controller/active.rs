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

use super::ControllerCore;
use crate::{
    party,
    tasks::{TaskWatch, WorkerTask},
    validation::ValidationPipeline,
};
use anyhow::Result;
use hints_common::{
    ConstructionId, HintsConstruction, HintsKeyPublication, NodeId, PartyId, PreprocessedKeys,
    PreprocessingVote, RosterTransitionWeights, Timestamp, Weight,
    db::{HintsStorageRW, StoreError},
};
use std::collections::BTreeMap;

/// Panics on a rejected second write of a write-once field, propagates other store errors.
fn expect_write_once<T>(result: Result<T, StoreError>) -> Result<T> {
    match result {
        Err(err) if err.is_write_once_violation() => {
            unreachable!("write-once field written twice: {err}")
        }
        result => Ok(result?),
    }
}

/// Full state machine of one construction.
///
/// Collected keys are validated in the background; votes are resolved to the
/// keys they vote for and accounted by source weight. All mutation happens
/// on the caller's thread, background tasks only see snapshots.
pub struct ActiveHintsController<DB> {
    core: ControllerCore<DB>,
    weights: RosterTransitionWeights,
    num_parties: u32,
    construction: HintsConstruction,
    pipeline: ValidationPipeline,
    votes: BTreeMap<NodeId, PreprocessedKeys>,
    publication: Option<WorkerTask<()>>,
    preprocessing: Option<WorkerTask<PreprocessedKeys>>,
    vote_submission: Option<WorkerTask<()>>,
}

impl<DB: HintsStorageRW + Clone> ActiveHintsController<DB> {
    pub fn new(
        core: ControllerCore<DB>,
        construction: HintsConstruction,
        weights: RosterTransitionWeights,
    ) -> Result<Self> {
        let num_parties = party::party_size_for_roster_node_count(weights.target_roster_size())?;
        let pipeline = ValidationPipeline::new(
            core.library.clone(),
            core.pool.clone(),
            num_parties,
            weights.target_weights().clone(),
        );

        Ok(Self {
            core,
            weights,
            num_parties,
            construction,
            pipeline,
            votes: Default::default(),
            publication: None,
            preprocessing: None,
            vote_submission: None,
        })
    }

    pub fn construction(&self) -> &HintsConstruction {
        &self.construction
    }

    pub fn construction_id(&self) -> ConstructionId {
        self.construction.construction_id
    }

    pub fn weights(&self) -> &RosterTransitionWeights {
        &self.weights
    }

    pub fn num_parties(&self) -> u32 {
        self.num_parties
    }

    pub fn num_validations(&self) -> usize {
        self.pipeline.num_validations()
    }

    pub fn party_id_of(&self, node_id: NodeId) -> Option<PartyId> {
        self.pipeline.party_id_of(node_id)
    }

    pub fn advance_construction(&mut self, now: Timestamp) -> Result<()> {
        if self.construction.is_complete() {
            return Ok(());
        }

        if !self.construction.has_preprocessing_start_time() {
            if !self.should_start_preprocessing(now)? {
                return self.ensure_hints_key_published();
            }
            self.start_preprocessing(now)?;
        }

        self.ensure_preprocessing_vote();

        Ok(())
    }

    /// Adds a live publication. Publications arriving after preprocessing started are ignored.
    pub fn add_hints_key_publication(&mut self, publication: HintsKeyPublication) -> Result<bool> {
        if self.construction.has_preprocessing_start_time() {
            tracing::debug!(
                construction_id = self.construction_id(),
                node_id = publication.node_id,
                "Ignoring hints key published after preprocessing started"
            );
            return Ok(false);
        }

        self.pipeline.add_publication(publication)?;
        Ok(true)
    }

    /// Adds a stored publication. Unlike live ones, publications adopted up to the
    /// recorded preprocessing start time are still accepted.
    pub fn replay_hints_key_publication(
        &mut self,
        publication: HintsKeyPublication,
    ) -> Result<bool> {
        if let Some(start) = self.construction.preprocessing_start_time {
            if publication.adoption_time > start {
                return Ok(false);
            }
        }

        self.pipeline.add_publication(publication)?;
        Ok(true)
    }

    /// Accounts a vote of a source node. Returns whether the vote was counted.
    pub fn add_preprocessing_vote(
        &mut self,
        node_id: NodeId,
        vote: PreprocessingVote,
    ) -> Result<bool> {
        let construction_id = self.construction_id();

        if self.construction.is_complete() {
            tracing::debug!(construction_id, node_id, "Ignoring vote for complete construction");
            return Ok(false);
        }
        if !self.weights.source_includes(node_id) {
            tracing::debug!(construction_id, node_id, "Ignoring vote of non-source node");
            return Ok(false);
        }
        if self.votes.contains_key(&node_id) {
            tracing::debug!(construction_id, node_id, "Ignoring repeated vote");
            return Ok(false);
        }

        let keys = match vote {
            PreprocessingVote::PreprocessedKeys(keys) => keys,
            PreprocessingVote::CongruentNode(congruent_node_id) => {
                match self.votes.get(&congruent_node_id) {
                    Some(keys) => keys.clone(),
                    None => {
                        tracing::debug!(
                            construction_id,
                            node_id,
                            congruent_node_id,
                            "Ignoring vote congruent to a node that has not voted"
                        );
                        return Ok(false);
                    }
                }
            }
        };

        self.votes.insert(node_id, keys.clone());
        let weight = self
            .votes
            .iter()
            .filter(|(_, voted)| **voted == keys)
            .map(|(voter, _)| self.weights.source_weight_of(*voter))
            .fold(0, Weight::saturating_add);
        let threshold = self.weights.source_weight_threshold();

        tracing::debug!(construction_id, node_id, weight, threshold, "Counted preprocessing vote");

        if weight >= threshold {
            self.complete(keys)?;
        }

        Ok(true)
    }

    /// Aborts every outstanding background task of the construction.
    pub fn cancel_pending_work(&self) {
        self.pipeline.cancel_all();
        if let Some(task) = &self.publication {
            task.cancel();
        }
        if let Some(task) = &self.preprocessing {
            task.cancel();
        }
        if let Some(task) = &self.vote_submission {
            task.cancel();
        }
    }

    /// Watches on every background task spawned for the construction.
    pub fn pending_work(&self) -> Vec<TaskWatch> {
        self.pipeline
            .watches()
            .chain(self.publication.iter().map(WorkerTask::watch))
            .chain(self.preprocessing.iter().map(WorkerTask::watch))
            .chain(self.vote_submission.iter().map(WorkerTask::watch))
            .collect()
    }

    fn should_start_preprocessing(&self, now: Timestamp) -> Result<bool> {
        // Everyone in the target roster published: nothing left to wait for.
        if self.pipeline.num_validations() == self.weights.target_roster_size() {
            return Ok(true);
        }
        if now < self.construction.grace_period_end {
            return Ok(false);
        }

        // Blocking on the round thread is allowed only here: past the grace period
        // nearly every scheduled validation has already finished, so the wait is short.
        let weight = self.pipeline.blocking_weight_of_valid_keys_up_to(now)?;
        let threshold = self.weights.target_weight_threshold();
        tracing::debug!(
            construction_id = self.construction_id(),
            weight,
            threshold,
            "Grace period is over, checking weight of valid hints keys"
        );

        Ok(weight >= threshold)
    }

    fn start_preprocessing(&mut self, now: Timestamp) -> Result<()> {
        let construction = expect_write_once(
            self.core
                .db
                .set_preprocessing_start_time(self.construction_id(), now),
        )?;

        tracing::info!(
            construction_id = construction.construction_id,
            validations = self.pipeline.num_validations(),
            %now,
            "Hints construction started preprocessing"
        );
        self.construction = construction;

        Ok(())
    }

    fn ensure_hints_key_published(&mut self) -> Result<()> {
        let self_id = self.core.self_id;
        if self.publication.is_some()
            || !self.weights.target_includes(self_id)
            || self.pipeline.party_id_of(self_id).is_some()
        {
            return Ok(());
        }

        let party_id = party::expected_party_id(
            self_id,
            self.pipeline.node_party_ids(),
            &self.weights.target_node_ids(),
            self.num_parties,
        )?;
        let num_parties = self.num_parties;
        let library = self.core.library.clone();
        let key_pair = self.core.key_pair.clone();
        let submissions = self.core.submissions.clone();

        tracing::debug!(
            construction_id = self.construction_id(),
            party_id,
            num_parties,
            "Publishing own hints key"
        );
        self.publication = Some(self.core.pool.spawn(async move {
            let hints_key = tokio::task::spawn_blocking(move || {
                library.compute_hints(key_pair.private_key(), party_id, num_parties)
            })
            .await??;
            submissions
                .submit_hints_key(party_id, num_parties, hints_key)
                .await
        }));

        Ok(())
    }

    fn ensure_preprocessing_vote(&mut self) {
        let self_id = self.core.self_id;
        let Some(start) = self.construction.preprocessing_start_time else {
            return;
        };
        if !self.weights.source_includes(self_id)
            || self.votes.contains_key(&self_id)
            || self.vote_submission.is_some()
        {
            return;
        }

        let Some(task) = self.preprocessing.as_ref() else {
            self.preprocessing = Some(self.spawn_preprocessing(start));
            return;
        };

        match task.outcome() {
            None => {}
            Some(Ok(keys)) => self.submit_vote(keys),
            Some(Err(err)) => {
                tracing::warn!(
                    construction_id = self.construction_id(),
                    "Hints preprocessing failed, retrying next round: {err}"
                );
                self.preprocessing = None;
            }
        }
    }

    fn spawn_preprocessing(&self, start: Timestamp) -> WorkerTask<PreprocessedKeys> {
        let snapshot = self.pipeline.snapshot(start);
        let library = self.core.library.clone();
        let num_parties = self.num_parties;

        tracing::debug!(
            construction_id = self.construction_id(),
            validations = snapshot.len(),
            "Computing preprocessed hints keys"
        );
        self.core.pool.spawn(async move {
            let hints = snapshot.valid_hints().await?;
            tokio::task::spawn_blocking(move || {
                library.preprocess(&hints.hints_keys, &hints.weights, num_parties)
            })
            .await?
        })
    }

    fn submit_vote(&mut self, keys: PreprocessedKeys) {
        let construction_id = self.construction_id();
        let congruent_node_id = self
            .votes
            .iter()
            .find_map(|(node_id, voted)| (*voted == keys).then_some(*node_id));
        let submissions = self.core.submissions.clone();

        tracing::debug!(construction_id, ?congruent_node_id, "Submitting preprocessing vote");
        self.vote_submission = Some(self.core.pool.spawn(async move {
            match congruent_node_id {
                Some(node_id) => {
                    submissions
                        .submit_congruent_vote(construction_id, node_id)
                        .await
                }
                None => submissions.submit_hints_vote(construction_id, keys).await,
            }
        }));
    }

    fn complete(&mut self, keys: PreprocessedKeys) -> Result<()> {
        let construction_id = self.construction_id();
        let construction = expect_write_once(self.core.db.set_hints_scheme(
            construction_id,
            keys,
            self.pipeline.node_party_ids().clone(),
        ))?;

        tracing::info!(
            construction_id,
            parties = self.pipeline.node_party_ids().len(),
            "Hints construction is complete"
        );
        self.construction = construction;

        let is_active = self
            .core
            .db
            .active_construction()
            .is_some_and(|active| active.construction_id == construction_id);
        if is_active {
            self.core.context.set_construction(&self.construction)?;
        }

        Ok(())
    }
}
