// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosting request management
//!
//! One [`RequestManagementService`] per router shard. Every message for a
//! request carries its correlation id, so all of them land on the same
//! shard; replication facts and timer ticks go to every shard.

use crate::config::RuntimeConfig;
use crate::messages::CoreMessage;
use crate::service::RequestManagementService;
use esr_bus::{FnPublisher, MailboxError, Publisher, QueueStats, Router, Ticker};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ROUTER_NAME: &str = "request-management";
const TICKER_NAME: &str = "request-timer";

pub struct RequestRuntime {
    router: Arc<Router<CoreMessage>>,
    ticker: Mutex<Option<Ticker>>,
    tick_interval: Duration,
}

impl RequestRuntime {
    /// Build the shards. Nothing runs until [`RequestRuntime::start`].
    pub fn new(
        config: &RuntimeConfig,
        bus: Arc<dyn Publisher<CoreMessage>>,
    ) -> Result<Self, MailboxError> {
        config.validate()?;
        let timeouts = config.timeouts;
        let router = Router::new(ROUTER_NAME, config.shards, config.mailbox.clone(), |_| {
            RequestManagementService::new(Arc::clone(&bus), timeouts)
        })?;
        Ok(Self {
            router: Arc::new(router),
            ticker: Mutex::new(None),
            tick_interval: config.tick_interval,
        })
    }

    pub fn start(&self) -> Result<(), MailboxError> {
        self.router.start()?;
        let router = Arc::clone(&self.router);
        let ticker = Ticker::start(
            TICKER_NAME,
            self.tick_interval,
            FnPublisher(move |tick: CoreMessage| router.publish_to_all(tick)),
            |now| CoreMessage::RequestManagerTimerTick { now },
        )?;
        *self.ticker.lock().unwrap_or_else(|e| e.into_inner()) = Some(ticker);
        tracing::info!(
            shards = self.router.shard_count(),
            tick_interval = ?self.tick_interval,
            "request management started"
        );
        Ok(())
    }

    /// Stop the ticker, then drain and stop every shard
    pub fn stop(&self) -> Result<(), MailboxError> {
        let ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut ticker) = ticker {
            ticker.stop();
        }
        self.router.stop()
    }

    pub fn shard_count(&self) -> usize {
        self.router.shard_count()
    }

    pub fn statistics(&self) -> Vec<QueueStats> {
        self.router.statistics()
    }
}

impl Publisher<CoreMessage> for RequestRuntime {
    fn publish(&self, message: CoreMessage) {
        if message.is_broadcast() {
            self.router.publish_to_all(message);
        } else {
            self.router.publish(message);
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
