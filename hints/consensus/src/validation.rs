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

//! Asynchronous validation of published hinTS keys.

use crate::{
    error::HintsErrorKind,
    library::HintsLibrary,
    party,
    tasks::{TaskError, TaskResult, TaskWatch, WorkerPool, WorkerTask},
};
use anyhow::{Context, Result, anyhow, bail};
use hints_common::{HintsKeyPublication, NodeId, PartyId, Timestamp, Weight};
use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::Arc,
};

/// Outcome of checking one published key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub party_id: PartyId,
    pub hints_key: Vec<u8>,
    pub is_valid: bool,
}

/// Valid keys and their target weights, indexed by party.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidHints {
    pub hints_keys: BTreeMap<PartyId, Vec<u8>>,
    pub weights: BTreeMap<PartyId, Weight>,
}

impl ValidHints {
    pub fn total_weight(&self) -> Weight {
        self.weights
            .values()
            .fold(0, |acc, weight| acc.saturating_add(*weight))
    }
}

/// Validations adopted up to some cutoff time, detached from the pipeline
/// so it can be awaited on a background task.
#[derive(Debug, Clone)]
pub struct ValidationSnapshot {
    validations: Vec<(NodeId, WorkerTask<Validation>)>,
    target_weights: Arc<BTreeMap<NodeId, Weight>>,
}

impl ValidationSnapshot {
    pub fn len(&self) -> usize {
        self.validations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validations.is_empty()
    }

    pub async fn valid_hints(&self) -> Result<ValidHints> {
        let mut hints = ValidHints::default();
        for (node_id, task) in &self.validations {
            let result = task.join().await;
            self.accumulate(&mut hints, *node_id, result)?;
        }
        Ok(hints)
    }

    /// Blocking counterpart of [`Self::valid_hints`].
    pub fn blocking_valid_hints(&self) -> Result<ValidHints> {
        let mut hints = ValidHints::default();
        for (node_id, task) in &self.validations {
            self.accumulate(&mut hints, *node_id, task.wait())?;
        }
        Ok(hints)
    }

    fn accumulate(
        &self,
        hints: &mut ValidHints,
        node_id: NodeId,
        result: TaskResult<Validation>,
    ) -> Result<()> {
        match result {
            Ok(validation) if validation.is_valid => {
                let weight = self.target_weights.get(&node_id).copied().unwrap_or(0);
                hints.weights.insert(validation.party_id, weight);
                hints
                    .hints_keys
                    .insert(validation.party_id, validation.hints_key);
            }
            Ok(validation) => {
                tracing::trace!(node_id, party_id = validation.party_id, "Invalid hints key");
            }
            Err(TaskError::Cancelled) => bail!("validation of node {node_id} key was cancelled"),
            Err(err) => {
                tracing::warn!(node_id, "Excluding hints key of node: {err}");
            }
        }
        Ok(())
    }
}

/// One validation task per accepted publication, ordered by adoption time.
pub struct ValidationPipeline {
    library: Arc<dyn HintsLibrary>,
    pool: WorkerPool,
    num_parties: u32,
    target_weights: Arc<BTreeMap<NodeId, Weight>>,
    node_party_ids: BTreeMap<NodeId, PartyId>,
    party_node_ids: BTreeMap<PartyId, NodeId>,
    validations: BTreeMap<(Timestamp, NodeId), WorkerTask<Validation>>,
}

impl ValidationPipeline {
    pub fn new(
        library: Arc<dyn HintsLibrary>,
        pool: WorkerPool,
        num_parties: u32,
        target_weights: BTreeMap<NodeId, Weight>,
    ) -> Self {
        Self {
            library,
            pool,
            num_parties,
            target_weights: Arc::new(target_weights),
            node_party_ids: Default::default(),
            party_node_ids: Default::default(),
            validations: Default::default(),
        }
    }

    /// Accepts the publication and schedules validation of its key.
    ///
    /// Fails for publications that break the protocol: wrong party count, node outside
    /// of the target roster, second publication of a node, or unexpected party id.
    pub fn add_publication(&mut self, publication: HintsKeyPublication) -> Result<()> {
        let HintsKeyPublication {
            node_id,
            party_id,
            num_parties,
            hints_key,
            adoption_time,
        } = publication;

        if num_parties != self.num_parties {
            return Err(anyhow!(HintsErrorKind::NumPartiesMismatch)).with_context(|| {
                format!(
                    "node {node_id} published for {num_parties} parties instead of {}",
                    self.num_parties
                )
            });
        }
        if !self.target_weights.contains_key(&node_id) {
            return Err(anyhow!(HintsErrorKind::UnknownNode))
                .with_context(|| format!("node {node_id} is not in the target roster"));
        }
        if self.node_party_ids.contains_key(&node_id) {
            return Err(anyhow!(HintsErrorKind::DuplicatePublication))
                .with_context(|| format!("node {node_id} already published a hints key"));
        }

        let target_node_ids: BTreeSet<NodeId> = self.target_weights.keys().copied().collect();
        let expected = party::expected_party_id(
            node_id,
            &self.node_party_ids,
            &target_node_ids,
            self.num_parties,
        )?;
        if party_id != expected {
            return Err(anyhow!(HintsErrorKind::PartyIdMismatch)).with_context(|| {
                format!("node {node_id} claimed party {party_id}, expected {expected}")
            });
        }

        self.node_party_ids.insert(node_id, party_id);
        self.party_node_ids.insert(party_id, node_id);

        let library = self.library.clone();
        let num_parties = self.num_parties;
        let task = self.pool.spawn_blocking(move || {
            let is_valid = library.validate_hints_key(&hints_key, party_id, num_parties);
            Ok(Validation {
                party_id,
                hints_key,
                is_valid,
            })
        });
        self.validations.insert((adoption_time, node_id), task);

        tracing::debug!(node_id, party_id, %adoption_time, "Scheduled hints key validation");

        Ok(())
    }

    pub fn num_parties(&self) -> u32 {
        self.num_parties
    }

    pub fn num_validations(&self) -> usize {
        self.validations.len()
    }

    pub fn party_id_of(&self, node_id: NodeId) -> Option<PartyId> {
        self.node_party_ids.get(&node_id).copied()
    }

    pub fn node_id_of(&self, party_id: PartyId) -> Option<NodeId> {
        self.party_node_ids.get(&party_id).copied()
    }

    pub fn node_party_ids(&self) -> &BTreeMap<NodeId, PartyId> {
        &self.node_party_ids
    }

    /// Validations of publications adopted at or before `cutoff`.
    pub fn snapshot(&self, cutoff: Timestamp) -> ValidationSnapshot {
        let validations = self
            .validations
            .range(..=(cutoff, NodeId::MAX))
            .map(|((_, node_id), task)| (*node_id, task.clone()))
            .collect();
        ValidationSnapshot {
            validations,
            target_weights: self.target_weights.clone(),
        }
    }

    /// Target weight of valid keys adopted at or before `time`, computed in the background.
    pub fn weight_of_valid_keys_up_to(
        &self,
        time: Timestamp,
    ) -> impl Future<Output = Result<Weight>> + Send + 'static + use<> {
        let snapshot = self.snapshot(time);
        async move { Ok(snapshot.valid_hints().await?.total_weight()) }
    }

    /// Blocking counterpart of [`Self::weight_of_valid_keys_up_to`].
    pub fn blocking_weight_of_valid_keys_up_to(&self, time: Timestamp) -> Result<Weight> {
        Ok(self.snapshot(time).blocking_valid_hints()?.total_weight())
    }

    pub fn watches(&self) -> impl Iterator<Item = TaskWatch> + '_ {
        self.validations.values().map(WorkerTask::watch)
    }

    pub fn cancel_all(&self) {
        self.validations.values().for_each(WorkerTask::cancel);
    }
}
