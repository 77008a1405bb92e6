// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The write-path message family
//!
//! Client requests enter the request managers, the managers emit storage
//! commands, storage and replication answer with acknowledgements, and each
//! request ends with one completion reply plus a `RequestCompleted` on the
//! bus.

use crate::id::CorrelationId;
use crate::result::{OperationResult, PrepareFlags};
use esr_bus::{Message, ReplyTo};
use std::time::Instant;
use uuid::Uuid;

/// Position of a record in the transaction log
pub type LogPosition = i64;

/// Number of an event within its stream
pub type EventNumber = i64;

/// Expected version meaning "any version"
pub const EXPECTED_VERSION_ANY: i64 = -2;

/// An event to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_id: Uuid,
    pub event_type: String,
    pub is_json: bool,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            is_json: false,
            data: data.into(),
            metadata: Vec::new(),
        }
    }
}

/// Facts about a written commit record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub log_position: LogPosition,
    pub transaction_position: LogPosition,
    pub first_event_number: EventNumber,
    pub last_event_number: EventNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStartCompleted {
    pub correlation_id: CorrelationId,
    pub transaction_id: i64,
    pub result: OperationResult,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionWriteCompleted {
    pub correlation_id: CorrelationId,
    pub transaction_id: i64,
    pub result: OperationResult,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCommitCompleted {
    pub correlation_id: CorrelationId,
    pub transaction_id: i64,
    pub result: OperationResult,
    pub message: Option<String>,
    pub first_event_number: EventNumber,
    pub last_event_number: EventNumber,
    pub prepare_position: LogPosition,
    pub commit_position: LogPosition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEventsCompleted {
    pub correlation_id: CorrelationId,
    pub result: OperationResult,
    pub message: Option<String>,
    pub first_event_number: EventNumber,
    pub last_event_number: EventNumber,
    pub prepare_position: LogPosition,
    pub commit_position: LogPosition,
    /// Stream version reported by a wrong-expected-version failure
    pub current_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStreamCompleted {
    pub correlation_id: CorrelationId,
    pub result: OperationResult,
    pub message: Option<String>,
    pub prepare_position: LogPosition,
    pub commit_position: LogPosition,
    /// Stream version reported by a wrong-expected-version failure
    pub current_version: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum CoreMessage {
    // -- client requests --
    TransactionStart {
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        stream_id: String,
        expected_version: i64,
    },
    TransactionWrite {
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        transaction_id: i64,
        events: Vec<Event>,
    },
    TransactionCommit {
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        transaction_id: i64,
    },
    WriteEvents {
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        stream_id: String,
        expected_version: i64,
        events: Vec<Event>,
    },
    DeleteStream {
        correlation_id: CorrelationId,
        envelope: ReplyTo<CoreMessage>,
        stream_id: String,
        expected_version: i64,
        hard_delete: bool,
    },

    // -- storage commands --
    WriteTransactionStart {
        correlation_id: CorrelationId,
        stream_id: String,
        expected_version: i64,
    },
    WriteTransactionData {
        correlation_id: CorrelationId,
        transaction_id: i64,
        events: Vec<Event>,
    },
    WriteTransactionEnd {
        correlation_id: CorrelationId,
        transaction_id: i64,
    },
    WriteCommit {
        correlation_id: CorrelationId,
        transaction_position: LogPosition,
    },
    WritePrepares {
        correlation_id: CorrelationId,
        stream_id: String,
        expected_version: i64,
        events: Vec<Event>,
    },
    WriteDelete {
        correlation_id: CorrelationId,
        stream_id: String,
        expected_version: i64,
        hard_delete: bool,
    },

    // -- storage and replication facts --
    PrepareAck {
        correlation_id: CorrelationId,
        log_position: LogPosition,
        flags: PrepareFlags,
    },
    CommitAck {
        correlation_id: CorrelationId,
        commit: CommitInfo,
    },
    CommitIndexed {
        correlation_id: CorrelationId,
        commit: CommitInfo,
    },
    AlreadyCommitted {
        correlation_id: CorrelationId,
        stream_id: String,
        commit: CommitInfo,
    },
    ReplicatedTo {
        log_position: LogPosition,
    },
    StreamDeleted {
        correlation_id: CorrelationId,
    },
    WrongExpectedVersion {
        correlation_id: CorrelationId,
        current_version: i64,
    },
    InvalidTransaction {
        correlation_id: CorrelationId,
    },
    RequestManagerTimerTick {
        now: Instant,
    },

    // -- completions --
    TransactionStartCompleted(TransactionStartCompleted),
    TransactionWriteCompleted(TransactionWriteCompleted),
    TransactionCommitCompleted(TransactionCommitCompleted),
    WriteEventsCompleted(WriteEventsCompleted),
    DeleteStreamCompleted(DeleteStreamCompleted),
    RequestCompleted {
        correlation_id: CorrelationId,
        success: bool,
    },
}

impl CoreMessage {
    /// The request this message belongs to, if any
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        use CoreMessage::*;
        match self {
            TransactionStart { correlation_id, .. }
            | TransactionWrite { correlation_id, .. }
            | TransactionCommit { correlation_id, .. }
            | WriteEvents { correlation_id, .. }
            | DeleteStream { correlation_id, .. }
            | WriteTransactionStart { correlation_id, .. }
            | WriteTransactionData { correlation_id, .. }
            | WriteTransactionEnd { correlation_id, .. }
            | WriteCommit { correlation_id, .. }
            | WritePrepares { correlation_id, .. }
            | WriteDelete { correlation_id, .. }
            | PrepareAck { correlation_id, .. }
            | CommitAck { correlation_id, .. }
            | CommitIndexed { correlation_id, .. }
            | AlreadyCommitted { correlation_id, .. }
            | StreamDeleted { correlation_id, .. }
            | WrongExpectedVersion { correlation_id, .. }
            | InvalidTransaction { correlation_id, .. }
            | RequestCompleted { correlation_id, .. } => Some(*correlation_id),
            CoreMessage::TransactionStartCompleted(c) => Some(c.correlation_id),
            CoreMessage::TransactionWriteCompleted(c) => Some(c.correlation_id),
            CoreMessage::TransactionCommitCompleted(c) => Some(c.correlation_id),
            CoreMessage::WriteEventsCompleted(c) => Some(c.correlation_id),
            CoreMessage::DeleteStreamCompleted(c) => Some(c.correlation_id),
            ReplicatedTo { .. } | RequestManagerTimerTick { .. } => None,
        }
    }

    /// Messages every request manager must observe
    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            CoreMessage::ReplicatedTo { .. } | CoreMessage::RequestManagerTimerTick { .. }
        )
    }

    /// Storage and replication facts addressed to one request
    pub fn is_acknowledgement(&self) -> bool {
        matches!(
            self,
            CoreMessage::PrepareAck { .. }
                | CoreMessage::CommitAck { .. }
                | CoreMessage::CommitIndexed { .. }
                | CoreMessage::AlreadyCommitted { .. }
                | CoreMessage::StreamDeleted { .. }
                | CoreMessage::WrongExpectedVersion { .. }
                | CoreMessage::InvalidTransaction { .. }
        )
    }

    /// Messages that create a request manager
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            CoreMessage::TransactionStart { .. }
                | CoreMessage::TransactionWrite { .. }
                | CoreMessage::TransactionCommit { .. }
                | CoreMessage::WriteEvents { .. }
                | CoreMessage::DeleteStream { .. }
        )
    }
}

impl Message for CoreMessage {
    const TYPE_NAMES: &'static [&'static str] = &[
        "TransactionStart",
        "TransactionWrite",
        "TransactionCommit",
        "WriteEvents",
        "DeleteStream",
        "WriteTransactionStart",
        "WriteTransactionData",
        "WriteTransactionEnd",
        "WriteCommit",
        "WritePrepares",
        "WriteDelete",
        "PrepareAck",
        "CommitAck",
        "CommitIndexed",
        "AlreadyCommitted",
        "ReplicatedTo",
        "StreamDeleted",
        "WrongExpectedVersion",
        "InvalidTransaction",
        "RequestManagerTimerTick",
        "TransactionStartCompleted",
        "TransactionWriteCompleted",
        "TransactionCommitCompleted",
        "WriteEventsCompleted",
        "DeleteStreamCompleted",
        "RequestCompleted",
    ];

    fn type_index(&self) -> usize {
        use CoreMessage::*;
        match self {
            TransactionStart { .. } => 0,
            TransactionWrite { .. } => 1,
            TransactionCommit { .. } => 2,
            WriteEvents { .. } => 3,
            DeleteStream { .. } => 4,
            WriteTransactionStart { .. } => 5,
            WriteTransactionData { .. } => 6,
            WriteTransactionEnd { .. } => 7,
            WriteCommit { .. } => 8,
            WritePrepares { .. } => 9,
            WriteDelete { .. } => 10,
            PrepareAck { .. } => 11,
            CommitAck { .. } => 12,
            CommitIndexed { .. } => 13,
            AlreadyCommitted { .. } => 14,
            ReplicatedTo { .. } => 15,
            StreamDeleted { .. } => 16,
            WrongExpectedVersion { .. } => 17,
            InvalidTransaction { .. } => 18,
            RequestManagerTimerTick { .. } => 19,
            CoreMessage::TransactionStartCompleted(_) => 20,
            CoreMessage::TransactionWriteCompleted(_) => 21,
            CoreMessage::TransactionCommitCompleted(_) => 22,
            CoreMessage::WriteEventsCompleted(_) => 23,
            CoreMessage::DeleteStreamCompleted(_) => 24,
            RequestCompleted { .. } => 25,
        }
    }

    fn affinity(&self) -> Option<u64> {
        self.correlation_id().map(|id| id.affinity())
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
