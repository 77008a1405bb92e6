//! Shared fixtures for the specs

#![allow(dead_code)]

pub use esr_bus::{
    FnPublisher, Handler, HandlerError, Mailbox, MailboxConfig, MailboxError, MailboxState,
    Message, Publisher, RecordingPublisher, ReplyTo, Router,
};
pub use esr_requests::{
    CoreMessage, CorrelationId, Event, IdGen, OperationResult, PrepareFlags, RequestRuntime,
    RequestTimeouts, RuntimeConfig, SequentialIdGen,
};
pub use std::sync::Arc;
pub use std::time::Duration;

use esr_requests::{CommitInfo, LogPosition};
use std::sync::{Mutex, Once, OnceLock};

/// Install a test-writer subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Small message family for bus specs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Work { key: u64, seq: u64 },
    Crash(String),
}

impl Message for Job {
    const TYPE_NAMES: &'static [&'static str] = &["Work", "Crash"];

    fn type_index(&self) -> usize {
        match self {
            Job::Work { .. } => 0,
            Job::Crash(_) => 1,
        }
    }

    fn affinity(&self) -> Option<u64> {
        match self {
            Job::Work { key, .. } => Some(*key),
            Job::Crash(_) => None,
        }
    }
}

/// Which storage commands the simulated writer answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Acknowledge and replicate everything
    Healthy,
    /// Acknowledge prepares but never write commits
    LosesCommits,
    /// Answer every command with `StreamDeleted`
    StreamDeleted,
}

/// Simulated storage writer and replication: answers storage commands with
/// acknowledgements published back into the runtime.
pub struct Storage {
    mode: StorageMode,
    runtime: OnceLock<Arc<RequestRuntime>>,
    next_position: Mutex<LogPosition>,
    seen: Mutex<Vec<CoreMessage>>,
}

impl Storage {
    pub fn new(mode: StorageMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            runtime: OnceLock::new(),
            next_position: Mutex::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn attach(&self, runtime: Arc<RequestRuntime>) {
        let _ = self.runtime.set(runtime);
    }

    /// Everything the request managers published
    pub fn seen(&self) -> Vec<CoreMessage> {
        self.seen.lock().unwrap().clone()
    }

    fn position(&self) -> LogPosition {
        let mut next = self.next_position.lock().unwrap();
        *next += 100;
        *next
    }

    fn answer(&self, message: CoreMessage) {
        if let Some(runtime) = self.runtime.get() {
            runtime.publish(message);
        }
    }

    fn prepare(&self, correlation_id: CorrelationId, flags: PrepareFlags) -> LogPosition {
        let log_position = self.position();
        self.answer(CoreMessage::PrepareAck {
            correlation_id,
            log_position,
            flags,
        });
        log_position
    }

    fn replicate(&self, log_position: LogPosition) {
        self.answer(CoreMessage::ReplicatedTo { log_position });
    }

    fn command(&self, message: &CoreMessage) {
        if self.mode == StorageMode::StreamDeleted {
            if let Some(correlation_id) = message.correlation_id().filter(|_| is_command(message)) {
                self.answer(CoreMessage::StreamDeleted { correlation_id });
            }
            return;
        }
        match message {
            CoreMessage::WriteTransactionStart { correlation_id, .. } => {
                let position = self.prepare(*correlation_id, PrepareFlags::TRANSACTION_BEGIN);
                self.replicate(position);
            }
            CoreMessage::WriteTransactionData {
                correlation_id,
                events,
                ..
            } => {
                let mut last = None;
                for _ in events {
                    last = Some(self.prepare(*correlation_id, PrepareFlags::DATA));
                }
                if let Some(position) = last {
                    self.replicate(position);
                }
            }
            CoreMessage::WriteTransactionEnd { correlation_id, .. } => {
                self.prepare(*correlation_id, PrepareFlags::TRANSACTION_END);
            }
            CoreMessage::WriteDelete { correlation_id, .. } => {
                self.prepare(*correlation_id, PrepareFlags::DELETE_TOMBSTONE);
            }
            CoreMessage::WritePrepares {
                correlation_id,
                events,
                ..
            } => {
                let count = events.len().max(1);
                for index in 0..count {
                    let mut flags = PrepareFlags::DATA;
                    if index == 0 {
                        flags = flags | PrepareFlags::TRANSACTION_BEGIN;
                    }
                    if index + 1 == count {
                        flags = flags | PrepareFlags::TRANSACTION_END;
                    }
                    self.prepare(*correlation_id, flags);
                }
            }
            CoreMessage::WriteCommit {
                correlation_id,
                transaction_position,
            } => {
                if self.mode == StorageMode::LosesCommits {
                    return;
                }
                let log_position = self.position();
                self.answer(CoreMessage::CommitAck {
                    correlation_id: *correlation_id,
                    commit: CommitInfo {
                        log_position,
                        transaction_position: *transaction_position,
                        first_event_number: 0,
                        last_event_number: 2,
                    },
                });
                self.replicate(log_position);
            }
            _ => {}
        }
    }
}

fn is_command(message: &CoreMessage) -> bool {
    matches!(
        message,
        CoreMessage::WriteTransactionStart { .. }
            | CoreMessage::WriteTransactionData { .. }
            | CoreMessage::WriteTransactionEnd { .. }
            | CoreMessage::WriteCommit { .. }
            | CoreMessage::WritePrepares { .. }
            | CoreMessage::WriteDelete { .. }
    )
}

impl Publisher<CoreMessage> for Storage {
    fn publish(&self, message: CoreMessage) {
        self.command(&message);
        self.seen.lock().unwrap().push(message);
    }
}

/// A started runtime wired to a simulated storage writer
pub struct Cluster {
    pub runtime: Arc<RequestRuntime>,
    pub storage: Arc<Storage>,
    pub ids: SequentialIdGen,
}

impl Cluster {
    pub fn start(mode: StorageMode, shards: usize) -> Self {
        Self::start_with_capacity(mode, shards, MailboxConfig::default().capacity)
    }

    /// Like [`Cluster::start`], with each shard's queue holding `capacity` messages
    pub fn start_with_capacity(mode: StorageMode, shards: usize, capacity: usize) -> Self {
        init_tracing();
        let storage = Storage::new(mode);
        let config = RuntimeConfig {
            mailbox: MailboxConfig::default().with_capacity(capacity),
            shards,
            tick_interval: Duration::from_millis(10),
            timeouts: RequestTimeouts::new(Duration::from_millis(200), Duration::from_millis(200)),
            ..RuntimeConfig::default()
        };
        let runtime = RequestRuntime::new(&config, storage.clone()).unwrap();
        runtime.start().unwrap();
        let runtime = Arc::new(runtime);
        storage.attach(Arc::clone(&runtime));
        Self {
            runtime,
            storage,
            ids: SequentialIdGen::new(),
        }
    }

    /// Publish a request built around a fresh envelope and await its reply
    pub async fn request(
        &self,
        build: impl FnOnce(CorrelationId, ReplyTo<CoreMessage>) -> CoreMessage,
    ) -> CoreMessage {
        let (envelope, mut replies) = ReplyTo::channel();
        self.runtime.publish(build(self.ids.next(), envelope));
        tokio::time::timeout(Duration::from_secs(5), replies.recv())
            .await
            .expect("reply within timeout")
            .expect("envelope kept alive")
    }

    /// Number of `RequestCompleted` messages seen on the bus
    pub fn completions(&self) -> usize {
        self.storage
            .seen()
            .iter()
            .filter(|m| matches!(m, CoreMessage::RequestCompleted { .. }))
            .count()
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        let _ = self.runtime.stop();
    }
}

pub fn events(n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| Event::new("OrderPlaced", format!("{{\"n\":{i}}}").into_bytes()))
        .collect()
}
