// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation result codes and prepare record flags

use std::fmt;
use std::ops::BitOr;

/// The closed set of outcomes a write-path operation resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationResult {
    Success,
    PrepareTimeout,
    CommitTimeout,
    ForwardTimeout,
    WrongExpectedVersion,
    StreamDeleted,
    InvalidTransaction,
    AccessDenied,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success)
    }

    /// Human-readable reason sent alongside a failure
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            OperationResult::Success => None,
            OperationResult::PrepareTimeout => Some("Prepare phase timeout."),
            OperationResult::CommitTimeout => Some("Commit phase timeout."),
            OperationResult::ForwardTimeout => Some("Forward timeout."),
            OperationResult::WrongExpectedVersion => Some("Wrong expected version."),
            OperationResult::StreamDeleted => Some("Stream is deleted."),
            OperationResult::InvalidTransaction => Some("Invalid transaction."),
            OperationResult::AccessDenied => Some("Access denied."),
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Flags carried by a prepare record and echoed in its acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrepareFlags(u16);

impl PrepareFlags {
    pub const NONE: PrepareFlags = PrepareFlags(0x00);
    /// The prepare carries event data
    pub const DATA: PrepareFlags = PrepareFlags(0x01);
    /// The prepare opens a transaction
    pub const TRANSACTION_BEGIN: PrepareFlags = PrepareFlags(0x02);
    /// The prepare closes a transaction
    pub const TRANSACTION_END: PrepareFlags = PrepareFlags(0x04);
    pub const STREAM_DELETE: PrepareFlags = PrepareFlags(0x08);
    /// Committed on its own; no commit record follows
    pub const IS_COMMITTED: PrepareFlags = PrepareFlags(0x20);
    pub const SINGLE_WRITE: PrepareFlags =
        PrepareFlags(Self::DATA.0 | Self::TRANSACTION_BEGIN.0 | Self::TRANSACTION_END.0);
    /// The single prepare written for a stream deletion
    pub const DELETE_TOMBSTONE: PrepareFlags = PrepareFlags(
        Self::STREAM_DELETE.0 | Self::TRANSACTION_BEGIN.0 | Self::TRANSACTION_END.0,
    );

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn from_bits(bits: u16) -> Self {
        PrepareFlags(bits)
    }

    /// True if every flag in `other` is set
    pub const fn contains(&self, other: PrepareFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set
    pub const fn intersects(&self, other: PrepareFlags) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for PrepareFlags {
    type Output = PrepareFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PrepareFlags(self.0 | rhs.0)
    }
}
