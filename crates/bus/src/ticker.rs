// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic tick publisher
//!
//! Timeouts are ordinary messages: a ticker thread publishes a tick at a
//! fixed interval and whoever owns deadlines reacts to it on its own thread.

use crate::error::MailboxError;
use crate::message::Publisher;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct Ticker {
    name: String,
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Publish `make_tick(now)` to `publisher` every `interval` until stopped
    pub fn start<M, P, F>(
        name: impl Into<String>,
        interval: Duration,
        publisher: P,
        mut make_tick: F,
    ) -> Result<Self, MailboxError>
    where
        M: Send + 'static,
        P: Publisher<M> + 'static,
        F: FnMut(Instant) -> M + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => publisher.publish(make_tick(Instant::now())),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| MailboxError::Spawn {
                name: name.clone(),
                source,
            })?;

        tracing::debug!(ticker = %name, ?interval, "ticker started");
        Ok(Self {
            name,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(ticker = %self.name, "ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
