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

use anyhow::Result;
use hints_common::{HintsConstruction, RosterTransitionWeights};

/// Stand-in for a construction that no deterministic quorum can ever finish.
#[derive(Debug, Clone)]
pub struct InertHintsController {
    construction: HintsConstruction,
    num_parties: u32,
}

impl InertHintsController {
    pub fn new(
        construction: HintsConstruction,
        weights: &RosterTransitionWeights,
    ) -> Result<Self> {
        tracing::warn!(
            construction_id = construction.construction_id,
            source_weight = weights.source_weight(),
            target_threshold = weights.target_weight_threshold(),
            "Source roster lacks target weight threshold, hints construction is inert"
        );

        let num_parties =
            crate::party::party_size_for_roster_node_count(weights.target_roster_size())?;

        Ok(Self {
            construction,
            num_parties,
        })
    }

    pub fn construction(&self) -> &HintsConstruction {
        &self.construction
    }

    pub fn num_parties(&self) -> u32 {
        self.num_parties
    }
}
