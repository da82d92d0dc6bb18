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

//! Weight model of a roster transition.
//!
//! A construction is tied to a source roster (the committee that currently
//! signs and votes) and a target roster (the committee whose keys are being
//! aggregated). All thresholds are pure functions of the two weight maps.

use crate::{NodeId, Weight};
use std::collections::{BTreeMap, BTreeSet};

/// Sum of all weights in the map; zero for an empty map.
pub fn total_weight(weights: &BTreeMap<NodeId, Weight>) -> Weight {
    weights.values().fold(0, |acc, weight| acc.saturating_add(*weight))
}

/// `⌈total / 3⌉`: the smallest weight that must include at least one honest node.
pub fn strong_minority(total: Weight) -> Weight {
    total.div_ceil(3)
}

/// `⌈total / 3⌉`.
pub fn one_third(total: Weight) -> Weight {
    total.div_ceil(3)
}

/// `⌊2 * total / 3⌋ + 1`.
pub fn more_than_two_thirds(total: Weight) -> Weight {
    ((2 * total as u128) / 3) as Weight + 1
}

/// Immutable per-construction view of source and target roster weights.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterTransitionWeights {
    source_weights: BTreeMap<NodeId, Weight>,
    target_weights: BTreeMap<NodeId, Weight>,
}

impl RosterTransitionWeights {
    pub fn new(
        source_weights: BTreeMap<NodeId, Weight>,
        target_weights: BTreeMap<NodeId, Weight>,
    ) -> Self {
        Self {
            source_weights,
            target_weights,
        }
    }

    /// Weights for a construction whose source and target rosters coincide.
    pub fn same_roster(weights: BTreeMap<NodeId, Weight>) -> Self {
        Self::new(weights.clone(), weights)
    }

    pub fn source_weights(&self) -> &BTreeMap<NodeId, Weight> {
        &self.source_weights
    }

    pub fn target_weights(&self) -> &BTreeMap<NodeId, Weight> {
        &self.target_weights
    }

    pub fn source_node_ids(&self) -> BTreeSet<NodeId> {
        self.source_weights.keys().copied().collect()
    }

    pub fn target_node_ids(&self) -> BTreeSet<NodeId> {
        self.target_weights.keys().copied().collect()
    }

    pub fn target_roster_size(&self) -> usize {
        self.target_weights.len()
    }

    pub fn source_includes(&self, node_id: NodeId) -> bool {
        self.source_weights.contains_key(&node_id)
    }

    pub fn target_includes(&self, node_id: NodeId) -> bool {
        self.target_weights.contains_key(&node_id)
    }

    /// Source weight of the node, zero when it is not in the source roster.
    pub fn source_weight_of(&self, node_id: NodeId) -> Weight {
        self.source_weights.get(&node_id).copied().unwrap_or(0)
    }

    /// Target weight of the node, zero when it is not in the target roster.
    pub fn target_weight_of(&self, node_id: NodeId) -> Weight {
        self.target_weights.get(&node_id).copied().unwrap_or(0)
    }

    pub fn source_weight(&self) -> Weight {
        total_weight(&self.source_weights)
    }

    pub fn target_weight(&self) -> Weight {
        total_weight(&self.target_weights)
    }

    /// Weight of agreeing source nodes needed to settle a preprocessing vote.
    pub fn source_weight_threshold(&self) -> Weight {
        strong_minority(self.source_weight())
    }

    /// Weight of valid target keys needed to start preprocessing after the grace period.
    pub fn target_weight_threshold(&self) -> Weight {
        more_than_two_thirds(self.target_weight())
    }

    /// Whether the source nodes hold enough target weight for the construction
    /// to ever reach a deterministic conclusion.
    pub fn source_nodes_have_target_threshold(&self) -> bool {
        let weight = self
            .source_weights
            .keys()
            .map(|node_id| self.target_weight_of(*node_id))
            .fold(0 as Weight, Weight::saturating_add);
        weight >= self.target_weight_threshold()
    }
}
