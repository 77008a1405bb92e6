// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the message substrate

use std::time::Duration;
use thiserror::Error;

/// Rejected ring queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),
    #[error("ring capacity {capacity} is below the minimum of {minimum}")]
    CapacityTooSmall { capacity: usize, minimum: usize },
}

/// A handler failed to process one message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from mailbox lifecycle operations
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("invalid mailbox configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("ring error: {0}")]
    Ring(#[from] RingError),
    #[error("mailbox {0} was already started")]
    AlreadyStarted(String),
    #[error("mailbox {0} was never started")]
    NotStarted(String),
    #[error("mailbox {name} did not stop within {timeout:?}")]
    StopTimeout { name: String, timeout: Duration },
    #[error("mailbox {name} stopped on handler fault: {message}")]
    HandlerFault { name: String, message: String },
    #[error("failed to spawn worker for mailbox {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
