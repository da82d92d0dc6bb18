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

use thiserror::Error;

/// Canonical hinTS error categories used across the consensus crate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HintsErrorKind {
    #[error("Hints context is not ready")]
    NotReady,
    #[error("Unknown node")]
    UnknownNode,
    #[error("Party id mismatch")]
    PartyIdMismatch,
    #[error("Number of parties mismatch")]
    NumPartiesMismatch,
    #[error("Duplicate hints key publication")]
    DuplicatePublication,
    #[error("No unused party id left")]
    NoUnusedPartyId,
    #[error("Construction has no hints scheme")]
    MissingHintsScheme,
    #[error("Roster is too large for the party universe")]
    RosterTooLarge,
}

/// Extension for downcasting `anyhow::Error` into `HintsErrorKind`.
pub trait HintsErrorExt {
    fn hints_error_kind(&self) -> Option<HintsErrorKind>;
}

impl HintsErrorExt for anyhow::Error {
    fn hints_error_kind(&self) -> Option<HintsErrorKind> {
        self.downcast_ref::<HintsErrorKind>().copied()
    }
}
