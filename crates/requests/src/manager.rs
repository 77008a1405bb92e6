// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-completion state machine
//!
//! A [`RequestManager`] turns the acknowledgements for one request into
//! exactly one completion. Acks may arrive in any order and more than once;
//! each updates the [`Ledger`], and the operation's [`Durability`] predicate
//! is re-evaluated after every update. Once completed, the manager ignores
//! everything.

use crate::config::RequestTimeouts;
use crate::id::CorrelationId;
use crate::messages::{CommitInfo, CoreMessage, LogPosition};
use crate::result::{OperationResult, PrepareFlags};
use esr_bus::{Clock, Publisher, ReplyTo, SystemClock};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Position reported before any replication fact arrives
pub const NO_POSITION: LogPosition = -1;

/// What the storage and replication layers have acknowledged so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    data_prepares: BTreeSet<LogPosition>,
    transaction_position: Option<LogPosition>,
    transaction_end_position: Option<LogPosition>,
    delete_position: Option<LogPosition>,
    commit: Option<CommitInfo>,
    already_committed: bool,
    replicated_to: LogPosition,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            data_prepares: BTreeSet::new(),
            transaction_position: None,
            transaction_end_position: None,
            delete_position: None,
            commit: None,
            already_committed: false,
            replicated_to: NO_POSITION,
        }
    }

    pub fn record_prepare(&mut self, log_position: LogPosition, flags: PrepareFlags) {
        if flags.contains(PrepareFlags::TRANSACTION_BEGIN) && self.transaction_position.is_none()
        {
            self.transaction_position = Some(log_position);
        }
        if flags.contains(PrepareFlags::DATA) {
            self.data_prepares.insert(log_position);
        }
        if flags.contains(PrepareFlags::TRANSACTION_END) {
            let end = self
                .transaction_end_position
                .map_or(log_position, |p| p.max(log_position));
            self.transaction_end_position = Some(end);
        }
        if flags.contains(PrepareFlags::STREAM_DELETE) && self.delete_position.is_none() {
            self.delete_position = Some(log_position);
        }
    }

    /// Keeps the first commit seen; later duplicates describe the same record
    pub fn record_commit(&mut self, commit: CommitInfo) {
        if self.commit.is_none() {
            self.commit = Some(commit);
        }
    }

    pub fn record_already_committed(&mut self, commit: CommitInfo) {
        self.record_commit(commit);
        self.already_committed = true;
    }

    /// Advance the watermark. Returns false if `log_position` is not ahead of it.
    pub fn advance_replication(&mut self, log_position: LogPosition) -> bool {
        if log_position > self.replicated_to {
            self.replicated_to = log_position;
            true
        } else {
            false
        }
    }

    pub fn is_replicated(&self, log_position: LogPosition) -> bool {
        self.replicated_to >= log_position
    }

    /// Number of distinct data prepares acknowledged
    pub fn data_prepare_count(&self) -> usize {
        self.data_prepares.len()
    }

    pub fn highest_data_prepare(&self) -> Option<LogPosition> {
        self.data_prepares.last().copied()
    }

    pub fn transaction_position(&self) -> Option<LogPosition> {
        self.transaction_position
    }

    pub fn transaction_end_position(&self) -> Option<LogPosition> {
        self.transaction_end_position
    }

    /// True once both the begin and the end prepare are acknowledged
    pub fn transaction_bounded(&self) -> bool {
        self.transaction_position.is_some() && self.transaction_end_position.is_some()
    }

    /// Position of the stream-delete tombstone, if one was acknowledged
    pub fn delete_position(&self) -> Option<LogPosition> {
        self.delete_position
    }

    pub fn commit(&self) -> Option<&CommitInfo> {
        self.commit.as_ref()
    }

    pub fn already_committed(&self) -> bool {
        self.already_committed
    }

    pub fn replicated_to(&self) -> LogPosition {
        self.replicated_to
    }

    /// True once a commit is recorded and replication has reached it
    pub fn commit_replicated(&self) -> bool {
        self.commit
            .as_ref()
            .is_some_and(|c| self.is_replicated(c.log_position))
    }
}

/// The terminal result of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub result: OperationResult,
    pub message: Option<String>,
    /// Stream version reported with `WrongExpectedVersion`
    pub current_version: Option<i64>,
}

impl Outcome {
    pub fn new(result: OperationResult) -> Self {
        Self {
            result,
            message: result.reason().map(str::to_owned),
            current_version: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    AwaitingPrepare,
    /// Prepares are in; waiting for the commit and for replication
    AwaitingCommit,
    Completed(Outcome),
}

impl Phase {
    pub fn is_completed(&self) -> bool {
        matches!(self, Phase::Completed(_))
    }
}

/// What distinguishes one kind of write request from another
pub trait Durability: Send + 'static {
    /// Name used in logs
    const KIND: &'static str;

    /// Storage command published when the request starts
    fn start_command(&self, correlation_id: CorrelationId) -> Option<CoreMessage>;

    /// Whether the prepare phase is satisfied
    fn prepared(&self, ledger: &Ledger) -> bool;

    /// Whether the request is durable enough to acknowledge
    fn durable(&self, ledger: &Ledger) -> bool;

    /// Storage command published once the prepare phase is satisfied
    fn after_prepare(
        &self,
        _correlation_id: CorrelationId,
        _ledger: &Ledger,
    ) -> Option<CoreMessage> {
        None
    }

    /// Whether `AlreadyCommitted` counts as a commit for this request
    fn accepts_already_committed(&self) -> bool {
        false
    }

    /// The reply sent to the requester
    fn reply(
        &self,
        correlation_id: CorrelationId,
        ledger: &Ledger,
        outcome: &Outcome,
    ) -> CoreMessage;
}

/// A running request, as the management service stores it
pub trait Request: Send {
    fn correlation_id(&self) -> CorrelationId;
    fn kind(&self) -> &'static str;
    fn start(&mut self);
    fn handle(&mut self, message: &CoreMessage);
    fn phase(&self) -> &Phase;

    /// Answer the requester with `outcome` without running the request.
    /// Nothing is published; the correlation id may belong to a live request.
    fn reject(&mut self, outcome: Outcome);

    fn is_completed(&self) -> bool {
        self.phase().is_completed()
    }
}

pub struct RequestManager<D: Durability, C: Clock = SystemClock> {
    correlation_id: CorrelationId,
    envelope: Option<ReplyTo<CoreMessage>>,
    bus: Arc<dyn Publisher<CoreMessage>>,
    timeouts: RequestTimeouts,
    clock: C,
    durability: D,
    ledger: Ledger,
    phase: Phase,
    prepare_deadline: Option<Instant>,
    commit_deadline: Option<Instant>,
}

impl<D: Durability, C: Clock> RequestManager<D, C> {
    pub fn new(
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        bus: Arc<dyn Publisher<CoreMessage>>,
        timeouts: RequestTimeouts,
        clock: C,
        durability: D,
    ) -> Self {
        Self {
            correlation_id,
            envelope: Some(envelope),
            bus,
            timeouts,
            clock,
            durability,
            ledger: Ledger::new(),
            phase: Phase::AwaitingPrepare,
            prepare_deadline: None,
            commit_deadline: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn durability(&self) -> &D {
        &self.durability
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.phase {
            Phase::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn prepare_deadline(&self) -> Option<Instant> {
        self.prepare_deadline
    }

    pub fn commit_deadline(&self) -> Option<Instant> {
        self.commit_deadline
    }

    fn evaluate(&mut self) {
        if self.phase == Phase::AwaitingPrepare && self.durability.prepared(&self.ledger) {
            self.phase = Phase::AwaitingCommit;
            self.commit_deadline = Some(self.clock.now() + self.timeouts.commit_timeout);
            if let Some(command) = self
                .durability
                .after_prepare(self.correlation_id, &self.ledger)
            {
                self.bus.publish(command);
            }
        }
        if self.phase == Phase::AwaitingCommit && self.durability.durable(&self.ledger) {
            self.complete(Outcome::new(OperationResult::Success));
        }
    }

    fn check_timeout(&mut self, now: Instant) {
        let expired = |deadline: Option<Instant>| deadline.is_some_and(|d| now >= d);
        match self.phase {
            Phase::AwaitingPrepare if expired(self.prepare_deadline) => {
                self.complete(Outcome::new(OperationResult::PrepareTimeout));
            }
            Phase::AwaitingCommit if expired(self.commit_deadline) => {
                self.complete(Outcome::new(OperationResult::CommitTimeout));
            }
            _ => {}
        }
    }

    fn complete(&mut self, outcome: Outcome) {
        if self.phase.is_completed() {
            return;
        }
        match outcome.result {
            OperationResult::Success => tracing::debug!(
                correlation_id = %self.correlation_id,
                kind = D::KIND,
                "request completed"
            ),
            OperationResult::PrepareTimeout | OperationResult::CommitTimeout => tracing::warn!(
                correlation_id = %self.correlation_id,
                kind = D::KIND,
                result = %outcome.result,
                replicated_to = self.ledger.replicated_to(),
                "request timed out"
            ),
            result => tracing::debug!(
                correlation_id = %self.correlation_id,
                kind = D::KIND,
                %result,
                "request failed"
            ),
        }

        let reply = self
            .durability
            .reply(self.correlation_id, &self.ledger, &outcome);
        let success = outcome.is_success();
        self.phase = Phase::Completed(outcome);

        self.bus.publish(CoreMessage::RequestCompleted {
            correlation_id: self.correlation_id,
            success,
        });
        if let Some(envelope) = self.envelope.take() {
            envelope.reply_with(reply);
        }
    }
}

impl<D: Durability, C: Clock> Request for RequestManager<D, C> {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn kind(&self) -> &'static str {
        D::KIND
    }

    fn start(&mut self) {
        if self.prepare_deadline.is_some() {
            tracing::warn!(correlation_id = %self.correlation_id, "request started twice");
            return;
        }
        self.prepare_deadline = Some(self.clock.now() + self.timeouts.prepare_timeout);
        if let Some(command) = self.durability.start_command(self.correlation_id) {
            self.bus.publish(command);
        }
        self.evaluate();
    }

    fn handle(&mut self, message: &CoreMessage) {
        if self.phase.is_completed() {
            return;
        }
        match message {
            CoreMessage::PrepareAck {
                log_position,
                flags,
                ..
            } => self.ledger.record_prepare(*log_position, *flags),
            CoreMessage::CommitAck { commit, .. } | CoreMessage::CommitIndexed { commit, .. } => {
                self.ledger.record_commit(*commit)
            }
            CoreMessage::AlreadyCommitted { commit, .. } => {
                if !self.durability.accepts_already_committed() {
                    tracing::debug!(
                        correlation_id = %self.correlation_id,
                        kind = D::KIND,
                        "ignoring already-committed notice"
                    );
                    return;
                }
                self.ledger.record_already_committed(*commit);
            }
            CoreMessage::ReplicatedTo { log_position } => {
                if !self.ledger.advance_replication(*log_position) {
                    return;
                }
            }
            CoreMessage::StreamDeleted { .. } => {
                return self.complete(Outcome::new(OperationResult::StreamDeleted));
            }
            CoreMessage::WrongExpectedVersion {
                current_version, ..
            } => {
                let outcome = Outcome {
                    current_version: Some(*current_version),
                    ..Outcome::new(OperationResult::WrongExpectedVersion)
                };
                return self.complete(outcome);
            }
            CoreMessage::InvalidTransaction { .. } => {
                return self.complete(Outcome::new(OperationResult::InvalidTransaction));
            }
            CoreMessage::RequestManagerTimerTick { now } => return self.check_timeout(*now),
            _ => return,
        }
        self.evaluate();
    }

    fn phase(&self) -> &Phase {
        &self.phase
    }

    fn reject(&mut self, outcome: Outcome) {
        if self.phase.is_completed() {
            return;
        }
        let reply = self
            .durability
            .reply(self.correlation_id, &self.ledger, &outcome);
        self.phase = Phase::Completed(outcome);
        if let Some(envelope) = self.envelope.take() {
            envelope.reply_with(reply);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
