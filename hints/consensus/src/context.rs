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

//! Signing context over the ready hinTS construction.

use crate::{
    config::SigningThreshold, error::HintsErrorKind, library::HintsLibrary, signing::Signing,
};
use anyhow::{Context, Result, anyhow};
use hints_common::{ConstructionId, HintsConstruction, NodeId, PartyId};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// Key material of a completed construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyConstruction {
    pub construction_id: ConstructionId,
    pub aggregation_key: Vec<u8>,
    pub verification_key: Vec<u8>,
    pub node_party_ids: BTreeMap<NodeId, PartyId>,
}

impl ReadyConstruction {
    pub fn from_construction(construction: &HintsConstruction) -> Result<Self> {
        let scheme = construction
            .hints_scheme
            .as_ref()
            .ok_or_else(|| anyhow!(HintsErrorKind::MissingHintsScheme))
            .with_context(|| {
                format!(
                    "construction #{} is not complete",
                    construction.construction_id
                )
            })?;

        Ok(Self {
            construction_id: construction.construction_id,
            aggregation_key: scheme.preprocessed_keys.aggregation_key.clone(),
            verification_key: scheme.preprocessed_keys.verification_key.clone(),
            node_party_ids: scheme.node_party_ids.clone(),
        })
    }
}

/// Cheaply cloneable handle to the signing state of the node.
///
/// The ready construction is swapped as a whole; readers always see either
/// the previous or the next snapshot.
#[derive(Clone, derive_more::Debug)]
pub struct HintsContext {
    #[debug(skip)]
    library: Arc<dyn HintsLibrary>,
    signing_threshold: SigningThreshold,
    ready: Arc<RwLock<Option<Arc<ReadyConstruction>>>>,
}

impl HintsContext {
    pub fn new(library: Arc<dyn HintsLibrary>, signing_threshold: SigningThreshold) -> Self {
        Self {
            library,
            signing_threshold,
            ready: Default::default(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.read().is_some()
    }

    pub fn ready(&self) -> Option<Arc<ReadyConstruction>> {
        self.ready.read().clone()
    }

    pub fn construction_id(&self) -> Result<ConstructionId> {
        Ok(self.ready_or_err()?.construction_id)
    }

    /// Replaces the ready construction with the given complete one.
    pub fn set_construction(&self, construction: &HintsConstruction) -> Result<()> {
        let ready = Arc::new(ReadyConstruction::from_construction(construction)?);
        tracing::info!(
            construction_id = ready.construction_id,
            parties = ready.node_party_ids.len(),
            "Hints context is ready"
        );
        *self.ready.write() = Some(ready);
        Ok(())
    }

    /// Starts signing of `message` with the ready construction.
    pub fn new_signing(&self, message: Vec<u8>) -> Result<Signing> {
        let ready = self.ready_or_err()?;
        let total_weight = self.library.extract_total_weight(&ready.verification_key)?;
        let threshold_weight = self.signing_threshold.threshold_weight(total_weight);

        tracing::debug!(
            construction_id = ready.construction_id,
            total_weight,
            threshold_weight,
            "New hints signing"
        );

        Ok(Signing::new(
            self.library.clone(),
            ready,
            threshold_weight,
            message,
        ))
    }

    /// Whether `signature` is a valid aggregate over `message` for the ready construction.
    pub fn verify_aggregate(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        let ready = self.ready_or_err()?;
        let total_weight = self.library.extract_total_weight(&ready.verification_key)?;
        Ok(self.library.verify_aggregate(
            signature,
            message,
            &ready.verification_key,
            self.signing_threshold.threshold_weight(total_weight),
        ))
    }

    fn ready_or_err(&self) -> Result<Arc<ReadyConstruction>> {
        self.ready().ok_or_else(|| anyhow!(HintsErrorKind::NotReady))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::HintsErrorExt, mock::FakeHintsLibrary};
    use hints_common::{HintsScheme, PreprocessedKeys, Timestamp, mock::Mock};

    fn complete(construction_id: ConstructionId, seed: u8) -> HintsConstruction {
        let mut construction = HintsConstruction::mock((construction_id, Timestamp::MAX));
        construction.hints_scheme = Some(HintsScheme {
            preprocessed_keys: PreprocessedKeys::mock(seed),
            node_party_ids: BTreeMap::from([(1, 0)]),
        });
        construction
    }

    #[test]
    fn not_ready_until_construction_is_set() {
        let context = HintsContext::new(
            Arc::new(FakeHintsLibrary::default()),
            SigningThreshold::OneThird,
        );
        assert!(!context.is_ready());

        let err = context.new_signing(b"message".to_vec()).unwrap_err();
        assert_eq!(err.hints_error_kind(), Some(HintsErrorKind::NotReady));
        let err = context.construction_id().unwrap_err();
        assert_eq!(err.hints_error_kind(), Some(HintsErrorKind::NotReady));
    }

    #[test]
    fn incomplete_construction_is_rejected() {
        let context = HintsContext::new(
            Arc::new(FakeHintsLibrary::default()),
            SigningThreshold::OneThird,
        );
        let construction = HintsConstruction::mock((1, Timestamp::MAX));
        let err = context.set_construction(&construction).unwrap_err();
        assert_eq!(
            err.hints_error_kind(),
            Some(HintsErrorKind::MissingHintsScheme)
        );
        assert!(!context.is_ready());
    }

    #[test]
    fn newer_construction_replaces_ready_snapshot() {
        let context = HintsContext::new(
            Arc::new(FakeHintsLibrary::default()),
            SigningThreshold::OneThird,
        );
        context.set_construction(&complete(1, 1)).unwrap();
        let first = context.ready().unwrap();
        assert_eq!(context.construction_id().unwrap(), 1);

        context.clone().set_construction(&complete(2, 2)).unwrap();
        let second = context.ready().unwrap();
        assert_eq!(second.construction_id, 2);
        assert_eq!(second.aggregation_key, PreprocessedKeys::mock(2).aggregation_key);

        // Snapshots held by readers are untouched.
        assert_eq!(first.construction_id, 1);
    }
}
