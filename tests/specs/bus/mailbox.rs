//! Mailbox specs
//!
//! Verify ordering, fault handling and shutdown of a single mailbox.

use crate::prelude::*;
use std::sync::Mutex;
use std::thread;

fn recording_mailbox(config: MailboxConfig) -> (Mailbox<Job>, Arc<Mutex<Vec<Job>>>) {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mailbox = Mailbox::<Job>::new("jobs", config, move |job: &Job| -> Result<(), HandlerError> {
        if let Job::Crash(reason) = job {
            return Err(HandlerError::new(reason.clone()));
        }
        sink.lock().unwrap().push(job.clone());
        Ok(())
    })
    .unwrap();
    (mailbox, seen)
}

#[test]
fn each_producer_is_observed_in_submission_order() {
    let (mailbox, seen) = recording_mailbox(MailboxConfig::default());
    let mailbox = Arc::new(mailbox);
    mailbox.start().unwrap();

    let producers: Vec<_> = (0..4u64)
        .map(|key| {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || {
                for seq in 0..2_000 {
                    mailbox.publish(Job::Work { key, seq });
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    mailbox.stop().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 8_000);
    for key in 0..4u64 {
        let sequence: Vec<u64> = seen
            .iter()
            .filter_map(|job| match job {
                Job::Work { key: k, seq } if *k == key => Some(*seq),
                _ => None,
            })
            .collect();
        similar_asserts::assert_eq!(sequence, (0..2_000).collect::<Vec<_>>());
    }
}

#[test]
fn production_mode_skips_a_faulting_message() {
    let (mailbox, seen) = recording_mailbox(MailboxConfig::default());
    mailbox.start().unwrap();

    mailbox.publish(Job::Work { key: 1, seq: 0 });
    mailbox.publish(Job::Crash("bad input".into()));
    mailbox.publish(Job::Work { key: 1, seq: 1 });
    mailbox.stop().unwrap();

    assert_eq!(mailbox.state(), MailboxState::Stopped);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[test]
fn fail_fast_mode_stops_on_the_first_fault() {
    let config = MailboxConfig::default().with_fail_fast(true);
    let (mailbox, seen) = recording_mailbox(config);
    mailbox.publish(Job::Crash("invariant broken".into()));
    mailbox.publish(Job::Work { key: 1, seq: 0 });
    mailbox.start().unwrap();

    let err = loop {
        if mailbox.state() == MailboxState::Stopped {
            break mailbox.stop().unwrap_err();
        }
        thread::sleep(Duration::from_millis(1));
    };

    match err {
        MailboxError::HandlerFault { name, message } => {
            assert_eq!(name, "jobs");
            assert!(message.contains("invariant broken"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn stop_drains_queued_messages() {
    let (mailbox, seen) = recording_mailbox(MailboxConfig::default());
    for seq in 0..100 {
        mailbox.publish(Job::Work { key: 0, seq });
    }
    mailbox.start().unwrap();
    mailbox.stop().unwrap();

    assert_eq!(seen.lock().unwrap().len(), 100);
    let stats = mailbox.statistics();
    assert_eq!(stats.total_items_processed, 100);
    assert_eq!(stats.length, 0);
}

#[test]
fn invalid_capacity_is_rejected_at_construction() {
    let result = Mailbox::<Job>::new(
        "jobs",
        MailboxConfig::default().with_capacity(1000),
        |_: &Job| -> Result<(), HandlerError> { Ok(()) },
    );
    assert!(matches!(result, Err(MailboxError::Config(_))));
}
