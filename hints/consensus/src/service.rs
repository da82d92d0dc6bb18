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

//! Node-facing facade of the hinTS subsystem.

use crate::{
    config::HintsConfig,
    context::HintsContext,
    controller::ControllerCore,
    controllers::HintsControllers,
    library::{BlsKeyPair, HintsLibrary},
    signing::Signing,
    submissions::{HintsSubmissions, TransactionSubmitter},
    tasks::{TaskResult, TaskWatch, WorkerPool, WorkerTask},
};
use anyhow::Result;
use hints_common::{
    ConstructionId, HintsKeyPublication, NodeId, PreprocessingVote, RosterTransitionWeights,
    Timestamp, db::HintsStorageRW,
};
use std::{collections::BTreeMap, future::Future, sync::Arc};

/// Ties the registry, the signing context and outbound submissions together.
pub struct HintsService<DB> {
    config: HintsConfig,
    db: DB,
    library: Arc<dyn HintsLibrary>,
    key_pair: BlsKeyPair,
    pool: WorkerPool,
    submissions: HintsSubmissions,
    context: HintsContext,
    controllers: HintsControllers<DB>,
    signings: BTreeMap<Vec<u8>, Signing>,
    outbound: Vec<WorkerTask<()>>,
}

impl<DB: HintsStorageRW + Clone> HintsService<DB> {
    pub fn new(
        config: HintsConfig,
        db: DB,
        library: Arc<dyn HintsLibrary>,
        key_pair: BlsKeyPair,
        submitter: Arc<dyn TransactionSubmitter>,
        pool: WorkerPool,
    ) -> Self {
        let submissions = HintsSubmissions::new(submitter);
        let context = HintsContext::new(library.clone(), config.signing_threshold);
        let controllers = HintsControllers::new(ControllerCore {
            self_id: config.node_id,
            db: db.clone(),
            library: library.clone(),
            pool: pool.clone(),
            submissions: submissions.clone(),
            context: context.clone(),
            key_pair: key_pair.clone(),
        });

        Self {
            config,
            db,
            library,
            key_pair,
            pool,
            submissions,
            context,
            controllers,
            signings: Default::default(),
            outbound: Default::default(),
        }
    }

    pub fn config(&self) -> &HintsConfig {
        &self.config
    }

    pub fn context(&self) -> &HintsContext {
        &self.context
    }

    pub fn controllers(&self) -> &HintsControllers<DB> {
        &self.controllers
    }

    /// Per-round entry point.
    ///
    /// Makes the active construction ready for signing once complete and advances
    /// the first construction still in progress: the active one, else the next one.
    /// `weights` describe the roster transition of that construction.
    pub fn reconcile(&mut self, now: Timestamp, weights: &RosterTransitionWeights) -> Result<()> {
        let active = self.db.active_construction();

        if let Some(active) = active.as_ref().filter(|active| active.is_complete()) {
            let ready_id = self.context.ready().map(|ready| ready.construction_id);
            if ready_id != Some(active.construction_id) {
                self.context.set_construction(active)?;
                self.prune_signings();
            }
        }

        let in_progress = active
            .filter(|construction| !construction.is_complete())
            .or_else(|| {
                self.db
                    .next_construction()
                    .filter(|construction| !construction.is_complete())
            });

        match in_progress {
            Some(construction) => self
                .controllers
                .get_or_create(&construction, weights)?
                .advance_construction(now),
            None => {
                self.controllers.stop();
                Ok(())
            }
        }
    }

    /// Hands an adopted publication to the matching controller and records it.
    ///
    /// A publication rejected by the in-progress controller is not stored, so the
    /// node can still republish a corrected one.
    pub fn handle_hints_key_publication(&mut self, publication: HintsKeyPublication) -> Result<()> {
        let node_id = publication.node_id;
        let num_parties = publication.num_parties;

        if let Some(controller) = self.controllers.get_in_progress_for_num_parties(num_parties) {
            controller
                .add_hints_key_publication(publication.clone())
                .inspect_err(|err| {
                    tracing::warn!(node_id, num_parties, "Rejected hints key: {err:#}")
                })?;
        }

        if !self.db.add_hints_key_publication(publication) {
            tracing::debug!(node_id, num_parties, "Keeping newer stored hints key");
        }

        Ok(())
    }

    /// Accounts an adopted vote and records it if the controller counted it.
    pub fn handle_preprocessing_vote(
        &mut self,
        construction_id: ConstructionId,
        node_id: NodeId,
        vote: PreprocessingVote,
    ) -> Result<()> {
        let Some(controller) = self.controllers.get_in_progress_by_id(construction_id) else {
            tracing::debug!(construction_id, node_id, "No controller in progress for vote");
            return Ok(());
        };

        if controller.add_preprocessing_vote(node_id, vote.clone())? {
            self.db
                .add_preprocessing_vote(construction_id, node_id, vote);
        }

        Ok(())
    }

    /// Routes a partial signature to the signing of its message.
    pub fn handle_partial_signature(
        &mut self,
        construction_id: ConstructionId,
        node_id: NodeId,
        message: &[u8],
        signature: Vec<u8>,
    ) -> bool {
        match self.signings.get(message) {
            Some(signing) => signing.incorporate(construction_id, node_id, signature),
            None => {
                tracing::debug!(construction_id, node_id, "No signing for partial signature");
                false
            }
        }
    }

    /// Starts signing of `message` and submits this node's partial signature.
    ///
    /// The returned future resolves with the aggregate signature.
    pub fn sign(
        &mut self,
        message: Vec<u8>,
    ) -> Result<impl Future<Output = TaskResult<Vec<u8>>> + Send + 'static + use<DB>> {
        self.prune_signings();
        self.outbound.retain(|task| !task.is_finished());

        if let Some(signing) = self.signings.get(&message) {
            return Ok(signing.future());
        }

        let signing = self.context.new_signing(message.clone())?;
        let signature = self.library.sign_bls(&message, self.key_pair.private_key());
        let construction_id = signing.construction_id();
        let submissions = self.submissions.clone();
        let partial_message = message.clone();
        self.outbound.push(self.pool.spawn(async move {
            submissions
                .submit_partial_signature(construction_id, partial_message, signature)
                .await
        }));

        let future = signing.future();
        self.signings.insert(message, signing);

        Ok(future)
    }

    pub fn publish_crs(&mut self, crs: Vec<u8>) {
        let submissions = self.submissions.clone();
        self.outbound.push(
            self.pool
                .spawn(async move { submissions.submit_crs_publication(crs).await }),
        );
    }

    /// Drops completed signings and those of a construction that is no longer ready.
    /// Futures of dropped pending signings resolve with [`crate::tasks::TaskError::Cancelled`].
    fn prune_signings(&mut self) {
        let ready_id = self.context.ready().map(|ready| ready.construction_id);
        self.signings.retain(|_, signing| {
            !signing.is_complete() && Some(signing.construction_id()) == ready_id
        });
    }

    /// Watches on the current controller's tasks and outbound submissions.
    pub fn pending_work(&self) -> Vec<TaskWatch> {
        self.controllers
            .current()
            .map(|controller| controller.pending_work())
            .unwrap_or_default()
            .into_iter()
            .chain(self.outbound.iter().map(WorkerTask::watch))
            .collect()
    }
}
