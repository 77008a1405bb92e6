//! Failure specs
//!
//! Verify that every request resolves to a failure code, never a hang,
//! when storage misbehaves.

use crate::prelude::*;
use esr_requests::EXPECTED_VERSION_ANY;
use std::io::Write;

fn result_of(reply: &CoreMessage) -> OperationResult {
    match reply {
        CoreMessage::TransactionStartCompleted(r) => r.result,
        CoreMessage::TransactionWriteCompleted(r) => r.result,
        CoreMessage::TransactionCommitCompleted(r) => r.result,
        CoreMessage::WriteEventsCompleted(r) => r.result,
        CoreMessage::DeleteStreamCompleted(r) => r.result,
        other => panic!("not a completion: {other:?}"),
    }
}

#[tokio::test]
async fn lost_commit_times_out_in_the_commit_phase() {
    let cluster = Cluster::start(StorageMode::LosesCommits, 2);

    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::WriteEvents {
            correlation_id,
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
            events: events(2),
        })
        .await;

    assert_eq!(result_of(&reply), OperationResult::CommitTimeout);
    assert_eq!(cluster.completions(), 1);
}

#[tokio::test]
async fn lost_commit_write_times_out_a_transaction_commit() {
    let cluster = Cluster::start(StorageMode::LosesCommits, 1);

    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::TransactionCommit {
            correlation_id,
            envelope,
            transaction_id: 12,
        })
        .await;

    // The end prepare arrives, but the commit write is lost
    assert_eq!(result_of(&reply), OperationResult::CommitTimeout);
}

#[tokio::test]
async fn deleted_stream_fails_every_request_kind() {
    let cluster = Cluster::start(StorageMode::StreamDeleted, 2);

    let start = cluster
        .request(|correlation_id, envelope| CoreMessage::TransactionStart {
            correlation_id,
            envelope,
            stream_id: "gone".into(),
            expected_version: 0,
        })
        .await;
    let append = cluster
        .request(|correlation_id, envelope| CoreMessage::WriteEvents {
            correlation_id,
            envelope,
            stream_id: "gone".into(),
            expected_version: 0,
            events: events(1),
        })
        .await;

    assert_eq!(result_of(&start), OperationResult::StreamDeleted);
    assert_eq!(result_of(&append), OperationResult::StreamDeleted);
    assert_eq!(cluster.completions(), 2);
}

#[tokio::test]
async fn runtime_runs_from_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        shards = 2
        tick_interval = "5ms"

        [timeouts]
        prepare_timeout = "50ms"
        commit_timeout = "50ms"
        "#
    )
    .unwrap();
    let config = RuntimeConfig::load(file.path()).unwrap();

    let storage = Storage::new(StorageMode::LosesCommits);
    let runtime = RequestRuntime::new(&config, storage.clone()).unwrap();
    runtime.start().unwrap();

    // Nothing answers a request published straight to the runtime
    let (envelope, mut replies) = ReplyTo::channel();
    runtime.publish(CoreMessage::TransactionStart {
        correlation_id: SequentialIdGen::new().next(),
        envelope,
        stream_id: "orders".into(),
        expected_version: 0,
    });
    let reply = tokio::time::timeout(Duration::from_secs(5), replies.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result_of(&reply), OperationResult::PrepareTimeout);
    assert_eq!(runtime.statistics().len(), 2);
    runtime.stop().unwrap();
}

#[tokio::test]
async fn deleting_a_deleted_stream_reports_it() {
    let cluster = Cluster::start(StorageMode::StreamDeleted, 1);

    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::DeleteStream {
            correlation_id,
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
            hard_delete: false,
        })
        .await;

    assert_eq!(result_of(&reply), OperationResult::StreamDeleted);
}
