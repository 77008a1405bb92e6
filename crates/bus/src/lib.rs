// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! esr-bus: the in-process message substrate
//!
//! This crate provides:
//! - A lock-free single-producer/single-consumer ring queue
//! - Mailboxes: one queue plus one dedicated worker thread per actor
//! - A sharded router that keeps per-key ordering across mailboxes
//! - Queue statistics for backpressure and monitoring
//! - Envelopes, publishers and a type-indexed dispatcher

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod envelope;
mod error;
pub mod mailbox;
pub mod message;
pub mod ring;
pub mod router;
pub mod stats;
pub mod ticker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::MailboxConfig;
pub use dispatch::{Dispatcher, SubscriptionId};
pub use envelope::{Envelope, ReplyTo};
pub use error::{ConfigError, HandlerError, MailboxError, RingError};
pub use mailbox::{Handler, Mailbox, MailboxState};
pub use message::{FnPublisher, Message, Publisher, RecordingPublisher};
pub use router::Router;
pub use stats::{QueueStats, QueueStatsCollector};
pub use ticker::Ticker;
