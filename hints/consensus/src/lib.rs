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

//! hinTS construction lifecycle and threshold signing.
//!
//! A construction collects hinTS keys of the target roster, preprocesses the
//! valid ones into an aggregation key and a verification key, and settles the
//! result by a vote of the source roster. Once the active construction is
//! complete, [`HintsContext`] aggregates partial BLS signatures into a single
//! signature verifiable against the construction's verification key.

pub mod config;
pub mod context;
pub mod controller;
pub mod controllers;
pub mod error;
pub mod library;
pub mod party;
pub mod service;
pub mod signing;
pub mod submissions;
pub mod tasks;
pub mod validation;

#[cfg(test)]
mod mock;

pub use config::{HintsConfig, HintsParams, SigningThreshold};
pub use context::{HintsContext, ReadyConstruction};
pub use controller::HintsController;
pub use controllers::HintsControllers;
pub use error::{HintsErrorExt, HintsErrorKind};
pub use library::{BlsKeyPair, HintsLibrary};
pub use service::HintsService;
pub use signing::Signing;
pub use submissions::{HintsSubmissions, HintsTransaction, TransactionSubmitter};
pub use tasks::{TaskError, TaskResult, WorkerPool};
