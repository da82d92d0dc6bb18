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

use crate::{KVDatabase, MemDb};
use hints_common::{
    ConstructionId, H256, HintsConstruction, HintsKeyPublication, HintsScheme, NodeId, PartyId,
    PreprocessedKeys, PreprocessingVote, Timestamp,
    db::{HintsStorageRO, HintsStorageRW, StoreError},
};
use parity_scale_codec::{Decode, Encode};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

#[derive(Debug, Clone, Copy)]
enum Key {
    Construction(ConstructionId),
    ActiveConstruction,
    NextConstruction,
    HintsKeyPublication(u32, NodeId),
    PreprocessingVote(ConstructionId, NodeId),
}

impl Key {
    fn discriminant(&self) -> u64 {
        match self {
            Self::Construction(_) => 0,
            Self::ActiveConstruction => 1,
            Self::NextConstruction => 2,
            Self::HintsKeyPublication(..) => 3,
            Self::PreprocessingVote(..) => 4,
        }
    }

    fn prefix(&self) -> [u8; 32] {
        H256::from_low_u64_be(self.discriminant()).into()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let prefix = self.prefix();
        match self {
            Self::Construction(construction_id) => {
                [prefix.as_ref(), construction_id.to_be_bytes().as_ref()].concat()
            }
            Self::ActiveConstruction | Self::NextConstruction => prefix.as_ref().to_vec(),
            Self::HintsKeyPublication(num_parties, node_id) => [
                prefix.as_ref(),
                num_parties.to_be_bytes().as_ref(),
                node_id.to_be_bytes().as_ref(),
            ]
            .concat(),
            Self::PreprocessingVote(construction_id, node_id) => [
                prefix.as_ref(),
                construction_id.to_be_bytes().as_ref(),
                node_id.to_be_bytes().as_ref(),
            ]
            .concat(),
        }
    }
}

#[derive(derive_more::Debug)]
#[debug("Database(KV)")]
pub struct Database {
    kv: Box<dyn KVDatabase>,
    // Serializes read-modify-write sequences across all clones.
    write_lock: Arc<Mutex<()>>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone_boxed(),
            write_lock: self.write_lock.clone(),
        }
    }
}

impl Database {
    pub fn new(kv: Box<dyn KVDatabase>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn memory() -> Self {
        Self::new(Box::new(MemDb::default()))
    }

    fn read<T: Decode>(&self, key: Key) -> Option<T> {
        self.kv.get(&key.to_bytes()).map(|data| {
            T::decode(&mut data.as_slice()).expect("Failed to decode data from database")
        })
    }

    fn write<T: Encode>(&self, key: Key, value: &T) {
        self.kv.put(&key.to_bytes(), value.encode());
    }

    /// Applies `f` to the stored construction and writes the result back.
    fn update_construction(
        &self,
        construction_id: ConstructionId,
        f: impl FnOnce(&mut HintsConstruction) -> Result<(), StoreError>,
    ) -> Result<HintsConstruction, StoreError> {
        let _guard = self.write_lock.lock();

        let mut construction: HintsConstruction = self
            .read(Key::Construction(construction_id))
            .ok_or(StoreError::UnknownConstruction(construction_id))?;
        f(&mut construction)?;
        self.write(Key::Construction(construction_id), &construction);

        Ok(construction)
    }
}

impl HintsStorageRO for Database {
    fn construction(&self, construction_id: ConstructionId) -> Option<HintsConstruction> {
        self.read(Key::Construction(construction_id))
    }

    fn active_construction(&self) -> Option<HintsConstruction> {
        let construction_id: ConstructionId = self.read(Key::ActiveConstruction)?;
        self.construction(construction_id)
    }

    fn next_construction(&self) -> Option<HintsConstruction> {
        let construction_id: Option<ConstructionId> = self.read(Key::NextConstruction)?;
        self.construction(construction_id?)
    }

    fn hints_key_publications(
        &self,
        target_node_ids: &BTreeSet<NodeId>,
        num_parties: u32,
    ) -> Vec<HintsKeyPublication> {
        let mut publications: Vec<HintsKeyPublication> = target_node_ids
            .iter()
            .filter_map(|node_id| self.read(Key::HintsKeyPublication(num_parties, *node_id)))
            .collect();
        publications.sort_by_key(|publication| (publication.adoption_time, publication.node_id));
        publications
    }

    fn preprocessing_votes(
        &self,
        construction_id: ConstructionId,
        source_node_ids: &BTreeSet<NodeId>,
    ) -> BTreeMap<NodeId, PreprocessingVote> {
        source_node_ids
            .iter()
            .filter_map(|node_id| {
                self.read(Key::PreprocessingVote(construction_id, *node_id))
                    .map(|vote| (*node_id, vote))
            })
            .collect()
    }
}

impl HintsStorageRW for Database {
    fn set_construction(&self, construction: HintsConstruction) {
        let _guard = self.write_lock.lock();

        tracing::trace!(
            construction_id = construction.construction_id,
            phase = %construction.phase(),
            "Set construction"
        );
        self.write(Key::Construction(construction.construction_id), &construction);
    }

    fn set_active_construction(&self, construction_id: ConstructionId) {
        self.write(Key::ActiveConstruction, &construction_id);
    }

    fn set_next_construction(&self, construction_id: Option<ConstructionId>) {
        self.write(Key::NextConstruction, &construction_id);
    }

    fn add_hints_key_publication(&self, publication: HintsKeyPublication) -> bool {
        let _guard = self.write_lock.lock();

        let key = Key::HintsKeyPublication(publication.num_parties, publication.node_id);
        let stored: Option<HintsKeyPublication> = self.read(key);
        if stored.is_some_and(|stored| stored.adoption_time >= publication.adoption_time) {
            return false;
        }
        self.write(key, &publication);

        true
    }

    fn add_preprocessing_vote(
        &self,
        construction_id: ConstructionId,
        node_id: NodeId,
        vote: PreprocessingVote,
    ) -> bool {
        let _guard = self.write_lock.lock();

        let key = Key::PreprocessingVote(construction_id, node_id);
        if self.kv.contains(&key.to_bytes()) {
            return false;
        }
        self.write(key, &vote);

        true
    }

    fn set_preprocessing_start_time(
        &self,
        construction_id: ConstructionId,
        time: Timestamp,
    ) -> Result<HintsConstruction, StoreError> {
        self.update_construction(construction_id, |construction| {
            if construction.preprocessing_start_time.is_some() {
                return Err(StoreError::PreprocessingStartTimeAlreadySet(
                    construction_id,
                ));
            }
            construction.preprocessing_start_time = Some(time);
            Ok(())
        })
    }

    fn set_hints_scheme(
        &self,
        construction_id: ConstructionId,
        preprocessed_keys: PreprocessedKeys,
        node_party_ids: BTreeMap<NodeId, PartyId>,
    ) -> Result<HintsConstruction, StoreError> {
        self.update_construction(construction_id, |construction| {
            if construction.hints_scheme.is_some() {
                return Err(StoreError::HintsSchemeAlreadySet(construction_id));
            }
            construction.hints_scheme = Some(HintsScheme {
                preprocessed_keys,
                node_party_ids,
            });
            Ok(())
        })
    }
}
