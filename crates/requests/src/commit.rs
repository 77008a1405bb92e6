// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Committing a transaction
//!
//! The transaction-end prepare triggers the commit write. The request is
//! durable once the commit is acknowledged (or reported as already
//! committed) and replication has reached the commit position.

use crate::id::CorrelationId;
use crate::manager::{Durability, Ledger, Outcome, RequestManager, NO_POSITION};
use crate::messages::{CoreMessage, TransactionCommitCompleted};
use esr_bus::SystemClock;

pub type TransactionCommitManager<C = SystemClock> = RequestManager<TransactionCommit, C>;

#[derive(Debug, Clone)]
pub struct TransactionCommit {
    transaction_id: i64,
}

impl TransactionCommit {
    pub fn new(transaction_id: i64) -> Self {
        Self { transaction_id }
    }
}

impl Durability for TransactionCommit {
    const KIND: &'static str = "TransactionCommit";

    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage> {
        Some(CoreMessage::WriteTransactionEnd {
            correlation_id,
            transaction_id: self.transaction_id,
        })
    }

    fn prepared(&self, ledger: &Ledger) -> bool {
        ledger.transaction_end_position().is_some() || ledger.commit().is_some()
    }

    fn durable(&self, ledger: &Ledger) -> bool {
        ledger.commit_replicated()
    }

    fn after_prepare(
        &self,
        correlation_id: CorrelationId,
        ledger: &Ledger,
    ) -> Option<CoreMessage> {
        if ledger.commit().is_some() {
            return None;
        }
        Some(CoreMessage::WriteCommit {
            correlation_id,
            transaction_position: self.transaction_id,
        })
    }

    fn accepts_already_committed(&self) -> bool {
        true
    }

    fn reply(
        &self,
        correlation_id: CorrelationId,
        ledger: &Ledger,
        outcome: &Outcome,
    ) -> CoreMessage {
        let commit = ledger.commit();
        CoreMessage::TransactionCommitCompleted(TransactionCommitCompleted {
            correlation_id,
            transaction_id: self.transaction_id,
            result: outcome.result,
            message: outcome.message.clone(),
            first_event_number: commit.map_or(NO_POSITION, |c| c.first_event_number),
            last_event_number: commit.map_or(NO_POSITION, |c| c.last_event_number),
            prepare_position: commit.map_or(NO_POSITION, |c| c.transaction_position),
            commit_position: commit.map_or(NO_POSITION, |c| c.log_position),
        })
    }
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
