// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation ids and their generation

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Links a request to its acknowledgements and its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Routing key: every message for one request shares it
    pub fn affinity(&self) -> u64 {
        let (high, low) = self.0.as_u64_pair();
        high ^ low
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Generates correlation ids
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> CorrelationId;
}

/// Random v4 ids for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> CorrelationId {
        CorrelationId::new_v4()
    }
}

/// Sequential ids for testing: 1, 2, 3, ... in the low bits
#[derive(Clone)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> CorrelationId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        CorrelationId(Uuid::from_u64_pair(0, n))
    }
}
