// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Appending events to a stream outside an explicit transaction
//!
//! Storage writes the prepares as one implicit transaction. Once both its
//! begin and end prepares are acknowledged the manager writes the commit, and the request is durable once the commit
//! is acknowledged and replicated.

use crate::id::CorrelationId;
use crate::manager::{Durability, Ledger, Outcome, RequestManager, NO_POSITION};
use crate::messages::{CoreMessage, Event, WriteEventsCompleted};
use esr_bus::SystemClock;

pub type WriteEventsManager<C = SystemClock> = RequestManager<WriteEvents, C>;

#[derive(Debug, Clone)]
pub struct WriteEvents {
    stream_id: String,
    expected_version: i64,
    events: Vec<Event>,
}

impl WriteEvents {
    pub fn new(stream_id: impl Into<String>, expected_version: i64, events: Vec<Event>) -> Self {
        Self {
            stream_id: stream_id.into(),
            expected_version,
            events,
        }
    }
}

impl Durability for WriteEvents {
    const KIND: &'static str = "WriteEvents";

    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage> {
        Some(CoreMessage::WritePrepares {
            correlation_id,
            stream_id: self.stream_id.clone(),
            expected_version: self.expected_version,
            events: self.events.clone(),
        })
    }

    /// Both ends of the implicit transaction are needed: the commit names
    /// the begin position, and acks may arrive end first
    fn prepared(&self, ledger: &Ledger) -> bool {
        ledger.transaction_bounded() || ledger.commit().is_some()
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
        CoreMessage::WriteEventsCompleted(WriteEventsCompleted {
            correlation_id,
            result: outcome.result,
            message: outcome.message.clone(),
            first_event_number: commit.map_or(NO_POSITION, |c| c.first_event_number),
            last_event_number: commit.map_or(NO_POSITION, |c| c.last_event_number),
            prepare_position: commit.map_or(NO_POSITION, |c| c.transaction_position),
            commit_position: commit.map_or(NO_POSITION, |c| c.log_position),
            current_version: outcome.current_version,
        })
    }
}

#[cfg(test)]
#[path = "append_tests.rs"]
mod tests;
