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

//! Assignment of target roster nodes to party slots of the hinTS universe.

use crate::error::HintsErrorKind;
use anyhow::{Context, Result, anyhow};
use hints_common::{NodeId, PartyId};
use std::collections::{BTreeMap, BTreeSet};

/// Number of party slots for a roster of `node_count` nodes: the smallest power
/// of two strictly greater than the node count, one slot being taken by the scheme.
pub fn party_size_for_roster_node_count(node_count: usize) -> Result<u32> {
    u32::try_from(node_count)
        .ok()
        .and_then(|count| count.checked_add(1))
        .and_then(u32::checked_next_power_of_two)
        .ok_or_else(|| anyhow!(HintsErrorKind::RosterTooLarge))
        .with_context(|| format!("no party universe fits {node_count} nodes"))
}

/// Party id the node must use in its key publication.
///
/// Unassigned target nodes (ascending) are zipped with unused party ids (ascending).
/// Removing a matched pair from both lists keeps every other pair intact, so the
/// result for a node does not depend on which other nodes were assigned before it.
pub fn expected_party_id(
    node_id: NodeId,
    assigned_node_party_ids: &BTreeMap<NodeId, PartyId>,
    target_node_ids: &BTreeSet<NodeId>,
    num_parties: u32,
) -> Result<PartyId> {
    if let Some(party_id) = assigned_node_party_ids.get(&node_id) {
        return Ok(*party_id);
    }

    let position = target_node_ids
        .iter()
        .filter(|id| !assigned_node_party_ids.contains_key(*id))
        .position(|id| *id == node_id)
        .ok_or_else(|| anyhow!(HintsErrorKind::UnknownNode))
        .with_context(|| format!("node {node_id} is not in the target roster"))?;

    let used: BTreeSet<PartyId> = assigned_node_party_ids.values().copied().collect();
    (0..num_parties)
        .filter(|party_id| !used.contains(party_id))
        .nth(position)
        .ok_or_else(|| anyhow!(HintsErrorKind::NoUnusedPartyId))
        .with_context(|| format!("no party id left for node {node_id} among {num_parties}"))
}
