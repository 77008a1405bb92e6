// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures shared by the unit tests

use crate::config::RequestTimeouts;
use crate::id::CorrelationId;
use crate::manager::{Durability, Request, RequestManager};
use crate::messages::{CommitInfo, CoreMessage, Event, LogPosition};
use crate::result::PrepareFlags;
use esr_bus::{Clock, FakeClock, RecordingPublisher, ReplyTo};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub(crate) fn cid(n: u64) -> CorrelationId {
    CorrelationId(Uuid::from_u64_pair(0, n))
}

pub(crate) fn events(n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| Event::new("test-event", vec![i as u8]))
        .collect()
}

/// An envelope that records its replies
pub(crate) fn reply_to() -> (ReplyTo<CoreMessage>, Arc<RecordingPublisher<CoreMessage>>) {
    let replies = Arc::new(RecordingPublisher::new());
    (ReplyTo::publish(replies.clone()), replies)
}

pub(crate) fn prepare_ack(
    id: CorrelationId,
    log_position: LogPosition,
    flags: PrepareFlags,
) -> CoreMessage {
    CoreMessage::PrepareAck {
        correlation_id: id,
        log_position,
        flags,
    }
}

pub(crate) fn commit_info(
    log_position: LogPosition,
    transaction_position: LogPosition,
) -> CommitInfo {
    CommitInfo {
        log_position,
        transaction_position,
        first_event_number: 0,
        last_event_number: 2,
    }
}

pub(crate) fn commit_ack(
    id: CorrelationId,
    log_position: LogPosition,
    transaction_position: LogPosition,
) -> CoreMessage {
    CoreMessage::CommitAck {
        correlation_id: id,
        commit: commit_info(log_position, transaction_position),
    }
}

pub(crate) fn replicated_to(log_position: LogPosition) -> CoreMessage {
    CoreMessage::ReplicatedTo { log_position }
}

pub(crate) const TIMEOUTS: RequestTimeouts = RequestTimeouts {
    prepare_timeout: Duration::from_secs(2),
    commit_timeout: Duration::from_secs(3),
};

/// One manager wired to recording publishers and a fake clock
pub(crate) struct Harness<D: Durability> {
    pub(crate) id: CorrelationId,
    pub(crate) manager: RequestManager<D, FakeClock>,
    pub(crate) bus: Arc<RecordingPublisher<CoreMessage>>,
    pub(crate) replies: Arc<RecordingPublisher<CoreMessage>>,
    pub(crate) clock: FakeClock,
}

impl<D: Durability> Harness<D> {
    pub(crate) fn new(durability: D) -> Self {
        let id = cid(1);
        let bus = Arc::new(RecordingPublisher::new());
        let (envelope, replies) = reply_to();
        let clock = FakeClock::new();
        let manager = RequestManager::new(
            id,
            envelope,
            bus.clone(),
            TIMEOUTS,
            clock.clone(),
            durability,
        );
        Self {
            id,
            manager,
            bus,
            replies,
            clock,
        }
    }

    /// New harness with the manager started and its start command consumed
    pub(crate) fn started(durability: D) -> Self {
        let mut harness = Self::new(durability);
        harness.manager.start();
        harness.bus.take();
        harness
    }

    pub(crate) fn send(&mut self, message: CoreMessage) {
        self.manager.handle(&message);
    }

    pub(crate) fn tick_after(&mut self, elapsed: Duration) {
        self.clock.advance(elapsed);
        let now = self.clock.now();
        self.send(CoreMessage::RequestManagerTimerTick { now });
    }

    /// `RequestCompleted` messages published so far
    pub(crate) fn completions(&self) -> Vec<bool> {
        self.bus
            .snapshot()
            .into_iter()
            .filter_map(|m| match m {
                CoreMessage::RequestCompleted { success, .. } => Some(success),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn replies(&self) -> Vec<CoreMessage> {
        self.replies.snapshot()
    }
}
