// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mailbox: one ring queue drained by one dedicated worker thread
//!
//! Handlers run synchronously on the worker, so everything a handler owns
//! is single-writer and needs no locking. Producers on any thread are
//! funneled through a mutex around the ring's single producer end.
//!
//! A handler publishing to its own mailbox never waits on the ring: only the
//! worker frees slots, so those messages go to an unbounded local queue that
//! the worker drains first.

use crate::config::MailboxConfig;
use crate::error::{HandlerError, MailboxError};
use crate::message::{Message, Publisher};
use crate::ring::{self, Consumer, Depth, Producer};
use crate::stats::{QueueStats, QueueStatsCollector};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Processes messages delivered by a mailbox
pub trait Handler<M>: Send {
    fn handle(&mut self, message: &M) -> Result<(), HandlerError>;
}

impl<M, F> Handler<M> for F
where
    F: FnMut(&M) -> Result<(), HandlerError> + Send,
{
    fn handle(&mut self, message: &M) -> Result<(), HandlerError> {
        (self)(message)
    }
}

/// Lifecycle of a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

impl MailboxState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => MailboxState::NotStarted,
            1 => MailboxState::Running,
            2 => MailboxState::Stopping,
            _ => MailboxState::Stopped,
        }
    }
}

/// How long a single handler invocation took, relative to the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slowness {
    Normal,
    Slow,
    VerySlow,
}

pub(crate) fn slowness(config: &MailboxConfig, elapsed: Duration) -> Slowness {
    if !config.watch_slow_messages {
        Slowness::Normal
    } else if elapsed > config.very_slow_message_threshold {
        Slowness::VerySlow
    } else if elapsed > config.slow_message_threshold {
        Slowness::Slow
    } else {
        Slowness::Normal
    }
}

/// State shared between the mailbox handle and its worker
struct Shared<M> {
    name: String,
    state: AtomicU8,
    stop_requested: AtomicBool,
    stats: QueueStatsCollector,
    depth: Depth<M>,
    fault: Mutex<Option<String>>,
    worker_thread: OnceLock<ThreadId>,
    // Messages the handler published to its own mailbox; only the worker touches it
    local: Mutex<VecDeque<M>>,
    local_len: AtomicUsize,
}

impl<M> Shared<M> {
    fn state(&self) -> MailboxState {
        MailboxState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: MailboxState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn on_worker_thread(&self) -> bool {
        self.worker_thread.get() == Some(&thread::current().id())
    }

    fn queue_len(&self) -> usize {
        self.depth.len() + self.local_len.load(Ordering::Acquire)
    }

    fn push_local(&self, message: M) {
        let mut local = self.local.lock().unwrap_or_else(|e| e.into_inner());
        local.push_back(message);
        self.local_len.store(local.len(), Ordering::Release);
    }

    /// Move up to `max` locally published messages onto `batch`
    fn take_local(&self, batch: &mut Vec<M>, max: usize) {
        if self.local_len.load(Ordering::Acquire) == 0 {
            return;
        }
        let mut local = self.local.lock().unwrap_or_else(|e| e.into_inner());
        let count = local.len().min(max);
        batch.extend(local.drain(..count));
        self.local_len.store(local.len(), Ordering::Release);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    exited: mpsc::Receiver<()>,
}

/// Signals the stopping thread when the worker leaves its loop, however it leaves
struct ExitSignal(mpsc::SyncSender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// An actor: a queue, a handler, and the thread that connects them
pub struct Mailbox<M: Message> {
    config: MailboxConfig,
    shared: Arc<Shared<M>>,
    producer: Mutex<Producer<M>>,
    pending: Mutex<Option<(Consumer<M>, Box<dyn Handler<M>>)>>,
    worker: Mutex<Option<Worker>>,
}

impl<M: Message> Mailbox<M> {
    /// Create a stopped mailbox; fails on invalid configuration
    pub fn new(
        name: impl Into<String>,
        config: MailboxConfig,
        handler: impl Handler<M> + 'static,
    ) -> Result<Self, MailboxError> {
        config.validate()?;
        let name = name.into();
        let (producer, consumer) = ring::channel(config.capacity)?;
        let handler: Box<dyn Handler<M>> = Box::new(handler);

        let shared = Arc::new(Shared {
            stats: QueueStatsCollector::new(name.clone(), config.group.clone(), M::TYPE_NAMES),
            name,
            state: AtomicU8::new(MailboxState::NotStarted as u8),
            stop_requested: AtomicBool::new(false),
            depth: producer.depth(),
            fault: Mutex::new(None),
            worker_thread: OnceLock::new(),
            local: Mutex::new(VecDeque::new()),
            local_len: AtomicUsize::new(0),
        });

        Ok(Self {
            config,
            shared,
            producer: Mutex::new(producer),
            pending: Mutex::new(Some((consumer, handler))),
            worker: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> MailboxState {
        self.shared.state()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue_len()
    }

    /// Snapshot of the mailbox's statistics; safe from any thread
    pub fn statistics(&self) -> QueueStats {
        self.shared.stats.statistics(self.queue_len())
    }

    /// Spawn the worker thread
    pub fn start(&self) -> Result<(), MailboxError> {
        let Some((consumer, handler)) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Err(MailboxError::AlreadyStarted(self.shared.name.clone()));
        };

        self.shared.stats.start();
        self.shared.set_state(MailboxState::Running);

        let (exit_tx, exit_rx) = mpsc::sync_channel(1);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || {
                let _exit = ExitSignal(exit_tx);
                let _ = shared.worker_thread.set(thread::current().id());
                run(&shared, &config, consumer, handler);
                shared.stats.stop();
                shared.set_state(MailboxState::Stopped);
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(Worker {
                    handle,
                    exited: exit_rx,
                });
                info!(mailbox = %self.shared.name, "mailbox started");
                Ok(())
            }
            Err(source) => {
                self.shared.set_state(MailboxState::Stopped);
                Err(MailboxError::Spawn {
                    name: self.shared.name.clone(),
                    source,
                })
            }
        }
    }

    /// Ask the worker to drain and exit, without waiting
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        let _ = self.shared.state.compare_exchange(
            MailboxState::Running as u8,
            MailboxState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Stop the worker and wait, up to the configured timeout, for it to exit
    pub fn stop(&self) -> Result<(), MailboxError> {
        if self.state() == MailboxState::NotStarted {
            return Err(MailboxError::NotStarted(self.shared.name.clone()));
        }
        self.request_stop();

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            match worker.exited.recv_timeout(self.config.stop_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        warn!(mailbox = %self.shared.name, "worker thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    error!(
                        mailbox = %self.shared.name,
                        timeout = ?self.config.stop_timeout,
                        "mailbox did not stop in time"
                    );
                    *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(worker);
                    return Err(MailboxError::StopTimeout {
                        name: self.shared.name.clone(),
                        timeout: self.config.stop_timeout,
                    });
                }
            }
            info!(mailbox = %self.shared.name, "mailbox stopped");
        }

        match self.fault() {
            Some(message) => Err(MailboxError::HandlerFault {
                name: self.shared.name.clone(),
                message,
            }),
            None => Ok(()),
        }
    }

    /// The handler fault that stopped a fail-fast mailbox, if any
    pub fn fault(&self) -> Option<String> {
        self.shared
            .fault
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Enqueue a message; callable from any thread, including the handler's own
    pub fn publish(&self, message: M) {
        if self.shared.on_worker_thread() {
            return self.shared.push_local(message);
        }
        let mut producer = self.producer.lock().unwrap_or_else(|e| e.into_inner());
        let mut message = message;
        let mut spins = 0u32;
        loop {
            match producer.try_enqueue(message) {
                Ok(()) => return,
                Err(returned) => {
                    if self.shared.state() == MailboxState::Stopped {
                        debug!(
                            mailbox = %self.shared.name,
                            message_type = returned.type_name(),
                            "mailbox stopped with a full queue, dropping message"
                        );
                        return;
                    }
                    message = returned;
                    if spins < self.config.spin_iterations {
                        spins += 1;
                        std::hint::spin_loop();
                    } else {
                        thread::yield_now();
                    }
                }
            }
        }
    }
}

impl<M: Message> Publisher<M> for Mailbox<M> {
    fn publish(&self, message: M) {
        Mailbox::publish(self, message)
    }
}

impl<M: Message> Drop for Mailbox<M> {
    fn drop(&mut self) {
        // The worker owns its own handle on the shared state and exits on its own
        if matches!(self.state(), MailboxState::Running) {
            self.request_stop();
        }
    }
}

fn run<M: Message>(
    shared: &Shared<M>,
    config: &MailboxConfig,
    mut consumer: Consumer<M>,
    mut handler: Box<dyn Handler<M>>,
) {
    let mut batch: Vec<M> = Vec::with_capacity(config.batch_size);
    let mut empty_polls = 0u32;
    let mut busy = false;

    loop {
        shared.take_local(&mut batch, config.batch_size);
        let room = config.batch_size.saturating_sub(batch.len());
        if room > 0 {
            consumer.try_dequeue_batch(&mut batch, room);
        }

        if batch.is_empty() {
            if busy {
                busy = false;
                shared.stats.enter_idle();
            }
            if shared.stop_requested.load(Ordering::Acquire) {
                return;
            }
            if empty_polls < config.spin_iterations {
                empty_polls += 1;
                std::hint::spin_loop();
            } else {
                thread::sleep(config.idle_sleep);
            }
            continue;
        }

        empty_polls = 0;
        if !busy {
            busy = true;
            shared.stats.enter_busy();
        }
        let mut queue_length =
            consumer.backlog() + shared.local_len.load(Ordering::Acquire) + batch.len();

        for message in batch.drain(..) {
            shared.stats.processing_started(message.type_index(), queue_length);
            queue_length = queue_length.saturating_sub(1);

            let outcome = invoke(&shared.name, config, handler.as_mut(), &message);
            shared.stats.processing_ended(1);

            if let Err(fault) = outcome {
                if config.fail_fast {
                    *shared.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(fault);
                    return;
                }
            }
        }
    }
}

/// Run the handler on one message, timing it and containing any failure
fn invoke<M: Message>(
    name: &str,
    config: &MailboxConfig,
    handler: &mut dyn Handler<M>,
    message: &M,
) -> Result<(), String> {
    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| handler.handle(message)));
    let elapsed = started.elapsed();

    match slowness(config, elapsed) {
        Slowness::Normal => {}
        Slowness::Slow => warn!(
            mailbox = %name,
            message_type = message.type_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "slow message"
        ),
        Slowness::VerySlow => error!(
            mailbox = %name,
            message_type = message.type_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "very slow message"
        ),
    }

    let fault = match result {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err.0,
        Err(payload) => panic_text(payload.as_ref()),
    };
    error!(
        mailbox = %name,
        message_type = message.type_name(),
        payload = ?message,
        error = %fault,
        "error while handling message"
    );
    Err(fault)
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("handler panicked: {text}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
