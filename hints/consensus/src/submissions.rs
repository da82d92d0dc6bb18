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

//! Outbound hinTS transactions.

use anyhow::Result;
use async_trait::async_trait;
use hints_common::{ConstructionId, NodeId, PartyId, PreprocessedKeys, PreprocessingVote};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::IsVariant)]
pub enum HintsTransaction {
    HintsKeyPublication {
        party_id: PartyId,
        num_parties: u32,
        hints_key: Vec<u8>,
    },
    PreprocessingVote {
        construction_id: ConstructionId,
        vote: PreprocessingVote,
    },
    PartialSignature {
        construction_id: ConstructionId,
        message: Vec<u8>,
        signature: Vec<u8>,
    },
    CrsPublication {
        crs: Vec<u8>,
    },
}

/// Gossips a transaction to the network on behalf of this node.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, transaction: HintsTransaction) -> Result<()>;
}

/// Typed submission helpers. Failures are logged and returned, never retried.
#[derive(Clone, derive_more::Debug)]
#[debug("HintsSubmissions")]
pub struct HintsSubmissions {
    submitter: Arc<dyn TransactionSubmitter>,
}

impl HintsSubmissions {
    pub fn new(submitter: Arc<dyn TransactionSubmitter>) -> Self {
        Self { submitter }
    }

    pub async fn submit_hints_key(
        &self,
        party_id: PartyId,
        num_parties: u32,
        hints_key: Vec<u8>,
    ) -> Result<()> {
        self.submit(HintsTransaction::HintsKeyPublication {
            party_id,
            num_parties,
            hints_key,
        })
        .await
    }

    pub async fn submit_hints_vote(
        &self,
        construction_id: ConstructionId,
        preprocessed_keys: PreprocessedKeys,
    ) -> Result<()> {
        self.submit(HintsTransaction::PreprocessingVote {
            construction_id,
            vote: PreprocessingVote::PreprocessedKeys(preprocessed_keys),
        })
        .await
    }

    pub async fn submit_congruent_vote(
        &self,
        construction_id: ConstructionId,
        congruent_node_id: NodeId,
    ) -> Result<()> {
        self.submit(HintsTransaction::PreprocessingVote {
            construction_id,
            vote: PreprocessingVote::CongruentNode(congruent_node_id),
        })
        .await
    }

    pub async fn submit_partial_signature(
        &self,
        construction_id: ConstructionId,
        message: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<()> {
        self.submit(HintsTransaction::PartialSignature {
            construction_id,
            message,
            signature,
        })
        .await
    }

    pub async fn submit_crs_publication(&self, crs: Vec<u8>) -> Result<()> {
        self.submit(HintsTransaction::CrsPublication { crs }).await
    }

    async fn submit(&self, transaction: HintsTransaction) -> Result<()> {
        let body = format!("{transaction:?}");
        self.submitter
            .submit(transaction)
            .await
            .inspect_err(|err| tracing::warn!(%body, "Failed to submit hints transaction: {err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSubmitter;

    #[tokio::test]
    async fn helpers_build_transactions() {
        let submitter = MockSubmitter::default();
        let submissions = HintsSubmissions::new(Arc::new(submitter.clone()));

        submissions.submit_hints_key(1, 8, vec![1]).await.unwrap();
        submissions.submit_congruent_vote(7, 2).await.unwrap();
        submissions.submit_crs_publication(vec![9]).await.unwrap();

        assert_eq!(
            submitter.transactions(),
            vec![
                HintsTransaction::HintsKeyPublication {
                    party_id: 1,
                    num_parties: 8,
                    hints_key: vec![1],
                },
                HintsTransaction::PreprocessingVote {
                    construction_id: 7,
                    vote: PreprocessingVote::CongruentNode(2),
                },
                HintsTransaction::CrsPublication { crs: vec![9] },
            ]
        );
    }

    #[tokio::test]
    async fn failures_are_returned_once() {
        let submitter = MockSubmitter::default();
        submitter.fail_submissions(true);
        let submissions = HintsSubmissions::new(Arc::new(submitter.clone()));

        submissions
            .submit_partial_signature(1, vec![1], vec![2])
            .await
            .unwrap_err();
        assert_eq!(submitter.attempts(), 1);
        assert!(submitter.transactions().is_empty());
    }
}
