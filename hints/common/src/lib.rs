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

//! hinTS common types and traits.
//!
//! Shared between the consensus-side ceremony logic and the storage layer:
//! identifiers and timestamps, the construction record, key publications,
//! preprocessing votes, the per-construction weight model and storage traits.

pub mod db;
pub mod weights;

#[cfg(feature = "mock")]
pub mod mock;

mod primitives;

pub use primitive_types::H256;
pub use primitives::*;
pub use weights::RosterTransitionWeights;
