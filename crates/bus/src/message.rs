// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message identity and the publisher seam
//!
//! A message family is one enum. Each variant owns a dense index into the
//! family's [`Message::TYPE_NAMES`] table, fixed at compile time, so
//! dispatch and statistics never inspect runtime types.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Name reported for an index outside the family table
pub const UNKNOWN_TYPE: &str = "<unknown>";

/// An immutable, type-tagged unit of work carried by the bus
pub trait Message: Debug + Send + 'static {
    /// Variant names, indexed by [`Message::type_index`]
    const TYPE_NAMES: &'static [&'static str];

    /// Dense index of this message's variant
    fn type_index(&self) -> usize;

    /// Routing key; messages sharing a key are handled in submission order
    fn affinity(&self) -> Option<u64> {
        None
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAMES
            .get(self.type_index())
            .copied()
            .unwrap_or(UNKNOWN_TYPE)
    }

    /// Number of distinct message types in the family
    fn type_count() -> usize
    where
        Self: Sized,
    {
        Self::TYPE_NAMES.len()
    }
}

/// Anything that accepts messages for asynchronous handling
pub trait Publisher<M>: Send + Sync {
    fn publish(&self, message: M);
}

impl<M, P: Publisher<M> + ?Sized> Publisher<M> for Arc<P> {
    fn publish(&self, message: M) {
        (**self).publish(message)
    }
}

/// Adapts a closure into a [`Publisher`]
pub struct FnPublisher<F>(pub F);

impl<M, F> Publisher<M> for FnPublisher<F>
where
    F: Fn(M) + Send + Sync,
{
    fn publish(&self, message: M) {
        (self.0)(message)
    }
}

/// Publisher that keeps every message it receives, for assertions
pub struct RecordingPublisher<M> {
    published: Mutex<Vec<M>>,
}

impl<M> RecordingPublisher<M> {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    /// Number of messages published so far
    pub fn len(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return everything published so far
    pub fn take(&self) -> Vec<M> {
        std::mem::take(&mut *self.published.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl<M: Clone> RecordingPublisher<M> {
    /// Copy of everything published so far
    pub fn snapshot(&self) -> Vec<M> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl<M> Default for RecordingPublisher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send> Publisher<M> for RecordingPublisher<M> {
    fn publish(&self, message: M) {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }
}
