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

use crate::{
    HintsConstruction, HintsKeyPublication, NodeId, PartyId, PreprocessedKeys,
    RosterTransitionWeights, Timestamp, Weight, H256,
};
use std::collections::BTreeMap;

pub trait Mock {
    type Args;

    fn mock(args: Self::Args) -> Self;
}

impl Mock for HintsConstruction {
    /// (construction id, grace period end)
    type Args = (u64, Timestamp);

    fn mock((construction_id, grace_period_end): (u64, Timestamp)) -> Self {
        HintsConstruction::new(
            construction_id,
            Some(H256::repeat_byte(construction_id as u8)),
            H256::repeat_byte(construction_id.wrapping_add(1) as u8),
            grace_period_end,
        )
    }
}

impl Mock for HintsKeyPublication {
    /// (node id, party id, num parties, adoption time)
    type Args = (NodeId, PartyId, u32, Timestamp);

    fn mock((node_id, party_id, num_parties, adoption_time): Self::Args) -> Self {
        HintsKeyPublication {
            node_id,
            party_id,
            num_parties,
            hints_key: vec![node_id as u8; 4],
            adoption_time,
        }
    }
}

impl Mock for PreprocessedKeys {
    type Args = u8;

    fn mock(seed: u8) -> Self {
        PreprocessedKeys {
            aggregation_key: vec![seed; 8],
            verification_key: vec![seed.wrapping_add(1); 8],
        }
    }
}

impl Mock for RosterTransitionWeights {
    /// Weights of nodes `0..n`, identical in source and target roster.
    type Args = Vec<Weight>;

    fn mock(weights: Vec<Weight>) -> Self {
        let weights: BTreeMap<NodeId, Weight> = weights
            .into_iter()
            .enumerate()
            .map(|(node_id, weight)| (node_id as NodeId, weight))
            .collect();
        RosterTransitionWeights::same_roster(weights)
    }
}
