//! Transaction specs
//!
//! Drive start, write, commit, append and delete requests through a sharded
//! runtime against a healthy simulated storage writer.

use crate::prelude::*;
use esr_requests::{
    DeleteStreamCompleted, TransactionCommitCompleted, TransactionStartCompleted,
    TransactionWriteCompleted, WriteEventsCompleted, EXPECTED_VERSION_ANY,
};

async fn start(cluster: &Cluster) -> TransactionStartCompleted {
    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::TransactionStart {
            correlation_id,
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
        })
        .await;
    match reply {
        CoreMessage::TransactionStartCompleted(reply) => reply,
        other => panic!("unexpected reply {other:?}"),
    }
}

async fn write(cluster: &Cluster, transaction_id: i64, count: usize) -> TransactionWriteCompleted {
    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::TransactionWrite {
            correlation_id,
            envelope,
            transaction_id,
            events: events(count),
        })
        .await;
    match reply {
        CoreMessage::TransactionWriteCompleted(reply) => reply,
        other => panic!("unexpected reply {other:?}"),
    }
}

async fn commit(cluster: &Cluster, transaction_id: i64) -> TransactionCommitCompleted {
    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::TransactionCommit {
            correlation_id,
            envelope,
            transaction_id,
        })
        .await;
    match reply {
        CoreMessage::TransactionCommitCompleted(reply) => reply,
        other => panic!("unexpected reply {other:?}"),
    }
}

async fn append(cluster: &Cluster, count: usize) -> WriteEventsCompleted {
    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::WriteEvents {
            correlation_id,
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
            events: events(count),
        })
        .await;
    match reply {
        CoreMessage::WriteEventsCompleted(reply) => reply,
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn explicit_transaction_runs_to_commit() {
    let cluster = Cluster::start(StorageMode::Healthy, 2);

    let started = start(&cluster).await;
    assert_eq!(started.result, OperationResult::Success);
    let transaction_id = started.transaction_id;
    assert!(transaction_id > 0);

    let written = write(&cluster, transaction_id, 3).await;
    assert_eq!(written.result, OperationResult::Success);
    assert_eq!(written.transaction_id, transaction_id);

    let committed = commit(&cluster, transaction_id).await;
    assert_eq!(committed.result, OperationResult::Success);
    assert_eq!(committed.prepare_position, transaction_id);
    assert!(committed.commit_position > transaction_id);
    assert_eq!(committed.message, None);

    assert_eq!(cluster.completions(), 3);
}

#[tokio::test]
async fn commit_is_written_after_the_end_prepare() {
    let cluster = Cluster::start(StorageMode::Healthy, 1);
    let transaction_id = start(&cluster).await.transaction_id;

    commit(&cluster, transaction_id).await;

    let seen = cluster.storage.seen();
    let end = seen
        .iter()
        .position(|m| matches!(m, CoreMessage::WriteTransactionEnd { .. }));
    let commit = seen
        .iter()
        .position(|m| matches!(m, CoreMessage::WriteCommit { .. }));
    assert!(end.is_some() && commit.is_some());
    assert!(end < commit);
}

#[tokio::test]
async fn append_completes_with_commit_details() {
    let cluster = Cluster::start(StorageMode::Healthy, 3);

    let appended = append(&cluster, 2).await;

    assert_eq!(appended.result, OperationResult::Success);
    assert!(appended.commit_position > appended.prepare_position);
    assert_eq!(appended.current_version, None);
}

#[tokio::test]
async fn concurrent_appends_each_complete_once() {
    let cluster = Cluster::start(StorageMode::Healthy, 4);

    let mut receivers = Vec::new();
    for _ in 0..50 {
        let (envelope, receiver) = ReplyTo::channel();
        cluster.runtime.publish(CoreMessage::WriteEvents {
            correlation_id: cluster.ids.next(),
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
            events: events(1),
        });
        receivers.push(receiver);
    }

    for mut receiver in receivers {
        let reply = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            reply,
            CoreMessage::WriteEventsCompleted(WriteEventsCompleted {
                result: OperationResult::Success,
                ..
            })
        ));
        // The envelope replies once and is then dropped
        assert!(receiver.recv().await.is_none());
    }
    assert_eq!(cluster.completions(), 50);
}

#[tokio::test]
async fn empty_write_succeeds_without_storage() {
    let cluster = Cluster::start(StorageMode::Healthy, 1);

    let written = write(&cluster, 42, 0).await;

    assert_eq!(written.result, OperationResult::Success);
}

#[tokio::test]
async fn write_batch_larger_than_the_queue_completes() {
    let cluster = Cluster::start_with_capacity(StorageMode::Healthy, 1, 8);
    let transaction_id = start(&cluster).await.transaction_id;

    let written = write(&cluster, transaction_id, 40).await;

    assert_eq!(written.result, OperationResult::Success);
    cluster.runtime.stop().unwrap();
}

#[tokio::test]
async fn delete_commits_the_tombstone() {
    let cluster = Cluster::start(StorageMode::Healthy, 2);

    let reply = cluster
        .request(|correlation_id, envelope| CoreMessage::DeleteStream {
            correlation_id,
            envelope,
            stream_id: "orders".into(),
            expected_version: EXPECTED_VERSION_ANY,
            hard_delete: true,
        })
        .await;
    let deleted = match reply {
        CoreMessage::DeleteStreamCompleted(reply) => reply,
        other => panic!("unexpected reply {other:?}"),
    };

    assert!(matches!(
        deleted,
        DeleteStreamCompleted {
            result: OperationResult::Success,
            message: None,
            ..
        }
    ));
    assert!(deleted.commit_position > deleted.prepare_position);
    let seen = cluster.storage.seen();
    assert!(seen
        .iter()
        .any(|m| matches!(m, CoreMessage::WriteDelete { hard_delete: true, .. })));
    assert_eq!(cluster.completions(), 1);
}
