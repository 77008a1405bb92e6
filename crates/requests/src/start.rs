// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting a transaction
//!
//! Durable once the transaction-begin prepare is acknowledged and
//! replication has reached its position. That position becomes the
//! transaction id.

use crate::id::CorrelationId;
use crate::manager::{Durability, Ledger, Outcome, RequestManager, NO_POSITION};
use crate::messages::{CoreMessage, TransactionStartCompleted};
use esr_bus::SystemClock;

pub type TransactionStartManager<C = SystemClock> = RequestManager<TransactionStart, C>;

#[derive(Debug, Clone)]
pub struct TransactionStart {
    stream_id: String,
    expected_version: i64,
}

impl TransactionStart {
    pub fn new(stream_id: impl Into<String>, expected_version: i64) -> Self {
        Self {
            stream_id: stream_id.into(),
            expected_version,
        }
    }
}

impl Durability for TransactionStart {
    const KIND: &'static str = "TransactionStart";

    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage> {
        Some(CoreMessage::WriteTransactionStart {
            correlation_id,
            stream_id: self.stream_id.clone(),
            expected_version: self.expected_version,
        })
    }

    fn prepared(&self, ledger: &Ledger) -> bool {
        ledger.transaction_position().is_some()
    }

    fn durable(&self, ledger: &Ledger) -> bool {
        ledger
            .transaction_position()
            .is_some_and(|p| ledger.is_replicated(p))
    }

    fn reply(
        &self,
        correlation_id: CorrelationId,
        ledger: &Ledger,
        outcome: &Outcome,
    ) -> CoreMessage {
        CoreMessage::TransactionStartCompleted(TransactionStartCompleted {
            correlation_id,
            transaction_id: ledger.transaction_position().unwrap_or(NO_POSITION),
            result: outcome.result,
            message: outcome.message.clone(),
        })
    }
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
