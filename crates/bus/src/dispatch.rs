// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-indexed dispatch of messages to subscribers
//!
//! Subscribers register against a variant of the message family. Dispatch
//! is a table lookup on the message's dense type index. A dispatcher is a
//! [`Handler`], so it usually runs as the handler of a mailbox.

use crate::error::HandlerError;
use crate::mailbox::Handler;
use crate::message::Message;

/// Identifies one subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<M> = Box<dyn FnMut(&M) -> Result<(), HandlerError> + Send>;

pub struct Dispatcher<M: Message> {
    by_type: Vec<Vec<(SubscriptionId, Subscriber<M>)>>,
    /// Receive every message, ahead of the typed subscribers
    global: Vec<(SubscriptionId, Subscriber<M>)>,
    next_id: u64,
}

impl<M: Message> Dispatcher<M> {
    pub fn new() -> Self {
        Self {
            by_type: M::TYPE_NAMES.iter().map(|_| Vec::new()).collect(),
            global: Vec::new(),
            next_id: 0,
        }
    }

    /// Index of `type_name` in the message family, if it belongs to it
    pub fn type_index_of(type_name: &str) -> Option<usize> {
        M::TYPE_NAMES.iter().position(|name| *name == type_name)
    }

    /// Subscribe to one message type by name; `None` if the family has no such type
    pub fn subscribe(
        &mut self,
        type_name: &str,
        handler: impl FnMut(&M) -> Result<(), HandlerError> + Send + 'static,
    ) -> Option<SubscriptionId> {
        let index = Self::type_index_of(type_name)?;
        let id = self.next_id();
        self.by_type[index].push((id, Box::new(handler)));
        Some(id)
    }

    /// Subscribe to every message
    pub fn subscribe_all(
        &mut self,
        handler: impl FnMut(&M) -> Result<(), HandlerError> + Send + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.global.push((id, Box::new(handler)));
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriber_count();
        self.global.retain(|(existing, _)| *existing != id);
        for subscribers in &mut self.by_type {
            subscribers.retain(|(existing, _)| *existing != id);
        }
        self.subscriber_count() < before
    }

    pub fn subscriber_count(&self) -> usize {
        self.global.len() + self.by_type.iter().map(Vec::len).sum::<usize>()
    }

    /// Deliver `message` to every matching subscriber.
    ///
    /// All subscribers run even if one fails; the first failure is returned.
    pub fn dispatch(&mut self, message: &M) -> Result<(), HandlerError> {
        let mut first_error = None;
        let typed = self
            .by_type
            .get_mut(message.type_index())
            .map(|subscribers| subscribers.iter_mut())
            .into_iter()
            .flatten();
        for (_, subscriber) in self.global.iter_mut().chain(typed) {
            if let Err(err) = subscriber(message) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

impl<M: Message> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Handler<M> for Dispatcher<M> {
    fn handle(&mut self, message: &M) -> Result<(), HandlerError> {
        self.dispatch(message)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
