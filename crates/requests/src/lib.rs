// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! esr-requests: write-path request managers
//!
//! Each write request (start, write to, or commit a transaction, append
//! events, or delete a stream) is tracked by a state machine that folds storage and replication
//! acknowledgements into exactly one completion. The management service
//! hosts those machines on a mailbox, keyed by correlation id.

pub mod append;
pub mod commit;
pub mod config;
pub mod delete;
mod error;
pub mod id;
pub mod manager;
pub mod messages;
pub mod result;
pub mod runtime;
pub mod service;
pub mod start;
pub mod write;

#[cfg(test)]
pub(crate) mod test_support;

pub use append::{WriteEvents, WriteEventsManager};
pub use commit::{TransactionCommit, TransactionCommitManager};
pub use config::{RequestTimeouts, RuntimeConfig};
pub use delete::{DeleteStream, DeleteStreamManager};
pub use error::RequestError;
pub use id::{CorrelationId, IdGen, SequentialIdGen, UuidIdGen};
pub use manager::{Durability, Ledger, Outcome, Phase, Request, RequestManager, NO_POSITION};
pub use messages::{
    CommitInfo, CoreMessage, DeleteStreamCompleted, Event, EventNumber, LogPosition,
    TransactionCommitCompleted, TransactionStartCompleted, TransactionWriteCompleted,
    WriteEventsCompleted, EXPECTED_VERSION_ANY,
};
pub use result::{OperationResult, PrepareFlags};
pub use runtime::RequestRuntime;
pub use service::RequestManagementService;
pub use start::{TransactionStart, TransactionStartManager};
pub use write::{TransactionWrite, TransactionWriteManager};
