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

//! Node-level configuration of the hinTS service.

use anyhow::{Context, Result};
use hints_common::{NodeId, Weight, weights};
use serde::Deserialize;

/// Fraction of the total weight a signing must accumulate before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum SigningThreshold {
    /// `⌈W/3⌉`: at least one honest signer under the BFT assumption.
    #[default]
    #[display("one-third")]
    OneThird,
    /// `⌊2W/3⌋ + 1`.
    #[display("more-than-two-thirds")]
    MoreThanTwoThirds,
}

impl SigningThreshold {
    pub fn threshold_weight(self, total_weight: Weight) -> Weight {
        match self {
            Self::OneThird => weights::one_third(total_weight),
            Self::MoreThanTwoThirds => weights::more_than_two_thirds(total_weight),
        }
    }
}

/// hinTS parameters as they appear in the node's TOML config.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HintsParams {
    /// Id of this node in the consensus rosters.
    #[serde(rename = "node-id")]
    pub node_id: Option<NodeId>,

    /// Weight fraction required to aggregate a signature.
    #[serde(rename = "signing-threshold")]
    pub signing_threshold: Option<SigningThreshold>,
}

impl HintsParams {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("failed to parse hints params")
    }

    /// Convert self into a proper `HintsConfig` object.
    pub fn into_config(self) -> Result<HintsConfig> {
        let node_id = self.node_id.context("`node-id` must be set")?;

        Ok(HintsConfig {
            node_id,
            signing_threshold: self.signing_threshold.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintsConfig {
    pub node_id: NodeId,
    pub signing_threshold: SigningThreshold,
}

impl HintsConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            signing_threshold: SigningThreshold::default(),
        }
    }
}
