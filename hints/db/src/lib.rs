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

//! Database for the hinTS ceremony.

pub use database::Database;
pub use mem::MemDb;

mod database;
mod mem;

pub trait KVDatabase: Send + Sync {
    fn clone_boxed(&self) -> Box<dyn KVDatabase>;

    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn take(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn contains(&self, key: &[u8]) -> bool;

    fn put(&self, key: &[u8], value: Vec<u8>);

    fn iter_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;
}
