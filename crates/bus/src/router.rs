// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sharded router over several mailboxes
//!
//! A message with an affinity key always lands on the same shard, so
//! messages sharing a key are handled in submission order. Messages without
//! a key are spread round-robin and carry no relative ordering guarantee.

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mailbox::{Handler, Mailbox};
use crate::message::{Message, Publisher};
use crate::stats::QueueStats;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Router<M: Message> {
    name: String,
    shards: Vec<Mailbox<M>>,
    next: AtomicUsize,
}

impl<M: Message> Router<M> {
    /// Build `shard_count` mailboxes named `"{name} #{index}"`, each with the
    /// handler returned by `factory(index)`
    pub fn new<H, F>(
        name: impl Into<String>,
        shard_count: usize,
        config: MailboxConfig,
        mut factory: F,
    ) -> Result<Self, MailboxError>
    where
        H: Handler<M> + 'static,
        F: FnMut(usize) -> H,
    {
        let name = name.into();
        if shard_count == 0 {
            return Err(MailboxError::Config(crate::error::ConfigError::Invalid(
                format!("router {name} needs at least one shard"),
            )));
        }

        let config = MailboxConfig {
            group: config.group.clone().or_else(|| Some(name.clone())),
            ..config
        };
        let shards = (0..shard_count)
            .map(|index| {
                Mailbox::<M>::new(format!("{name} #{index}"), config.clone(), factory(index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            shards,
            next: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard `message` would be published to.
    ///
    /// Messages without an affinity key consume a round-robin slot.
    pub fn shard_for(&self, message: &M) -> usize {
        let shards = self.shards.len();
        match message.affinity() {
            // Reduce in u64 so keys wider than usize keep their spread
            Some(key) => (key % shards as u64) as usize,
            None => self.next.fetch_add(1, Ordering::Relaxed) % shards,
        }
    }

    pub fn publish(&self, message: M) {
        let index = self.shard_for(&message);
        self.shards[index].publish(message);
    }

    /// Start every shard; stops at the first failure
    pub fn start(&self) -> Result<(), MailboxError> {
        for shard in &self.shards {
            shard.start()?;
        }
        Ok(())
    }

    pub fn request_stop(&self) {
        for shard in &self.shards {
            shard.request_stop();
        }
    }

    /// Stop every shard and wait for all of them; reports the first error
    pub fn stop(&self) -> Result<(), MailboxError> {
        self.request_stop();
        let mut first_error = None;
        for shard in &self.shards {
            if let Err(err) = shard.stop() {
                tracing::error!(
                    router = %self.name,
                    shard = shard.name(),
                    error = %err,
                    "shard failed to stop"
                );
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn statistics(&self) -> Vec<QueueStats> {
        self.shards.iter().map(Mailbox::statistics).collect()
    }

    /// Messages waiting across all shards
    pub fn queue_len(&self) -> usize {
        self.shards.iter().map(Mailbox::queue_len).sum()
    }
}

impl<M: Message + Clone> Router<M> {
    /// Deliver a copy of `message` to every shard
    pub fn publish_to_all(&self, message: M) {
        for shard in &self.shards {
            shard.publish(message.clone());
        }
    }
}

impl<M: Message> Publisher<M> for Router<M> {
    fn publish(&self, message: M) {
        Router::publish(self, message)
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
