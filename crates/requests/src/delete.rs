// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deleting a stream
//!
//! Storage writes a single tombstone prepare that both opens and closes its
//! transaction. The manager then writes the commit, and the delete is
//! durable once that commit is replicated.

use crate::id::CorrelationId;
use crate::manager::{Durability, Ledger, Outcome, RequestManager, NO_POSITION};
use crate::messages::{CoreMessage, DeleteStreamCompleted};
use esr_bus::SystemClock;

pub type DeleteStreamManager<C = SystemClock> = RequestManager<DeleteStream, C>;

#[derive(Debug, Clone)]
pub struct DeleteStream {
    stream_id: String,
    expected_version: i64,
    hard_delete: bool,
}

impl DeleteStream {
    pub fn new(stream_id: impl Into<String>, expected_version: i64, hard_delete: bool) -> Self {
        Self {
            stream_id: stream_id.into(),
            expected_version,
            hard_delete,
        }
    }
}

impl Durability for DeleteStream {
    const KIND: &'static str = "DeleteStream";

    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage> {
        Some(CoreMessage::WriteDelete {
            correlation_id,
            stream_id: self.stream_id.clone(),
            expected_version: self.expected_version,
            hard_delete: self.hard_delete,
        })
    }

    fn prepared(&self, ledger: &Ledger) -> bool {
        let tombstoned = ledger.delete_position().is_some() && ledger.transaction_bounded();
        tombstoned || ledger.commit().is_some()
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
            transaction_position: ledger.transaction_position()?,
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
        CoreMessage::DeleteStreamCompleted(DeleteStreamCompleted {
            correlation_id,
            result: outcome.result,
            message: outcome.message.clone(),
            prepare_position: commit.map_or(NO_POSITION, |c| c.transaction_position),
            commit_position: commit.map_or(NO_POSITION, |c| c.log_position),
            current_version: outcome.current_version,
        })
    }
}

#[cfg(test)]
#[path = "delete_tests.rs"]
mod tests;
