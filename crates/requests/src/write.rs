// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writing a batch of events into an open transaction
//!
//! Durable only when every event in the batch has a prepare ack and
//! replication has passed the highest of those positions.

use crate::id::CorrelationId;
use crate::manager::{Durability, Ledger, Outcome, RequestManager};
use crate::messages::{CoreMessage, Event, TransactionWriteCompleted};
use esr_bus::SystemClock;

pub type TransactionWriteManager<C = SystemClock> = RequestManager<TransactionWrite, C>;

#[derive(Debug, Clone)]
pub struct TransactionWrite {
    transaction_id: i64,
    events: Vec<Event>,
}

impl TransactionWrite {
    pub fn new(transaction_id: i64, events: Vec<Event>) -> Self {
        Self {
            transaction_id,
            events,
        }
    }

    pub fn expected_prepares(&self) -> usize {
        self.events.len()
    }
}

impl Durability for TransactionWrite {
    const KIND: &'static str = "TransactionWrite";

    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage> {
        Some(CoreMessage::WriteTransactionData {
            correlation_id,
            transaction_id: self.transaction_id,
            events: self.events.clone(),
        })
    }

    fn prepared(&self, ledger: &Ledger) -> bool {
        ledger.data_prepare_count() >= self.expected_prepares()
    }

    fn durable(&self, ledger: &Ledger) -> bool {
        if !self.prepared(ledger) {
            return false;
        }
        match ledger.highest_data_prepare() {
            Some(highest) => ledger.is_replicated(highest),
            None => true,
        }
    }

    fn reply(
        &self,
        correlation_id: CorrelationId,
        _ledger: &Ledger,
        outcome: &Outcome,
    ) -> CoreMessage {
        CoreMessage::TransactionWriteCompleted(TransactionWriteCompleted {
            correlation_id,
            transaction_id: self.transaction_id,
            result: outcome.result,
            message: outcome.message.clone(),
        })
    }
}

#[cfg(test)]
#[path = "write_tests.rs"]
mod tests;
