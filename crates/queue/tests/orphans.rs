#![forbid(unsafe_code)]

mod support;

use gq_core::{BatchProposal, BatchState, JobState};
use gq_queue::{Catalog, QueueConfig};
use std::time::Duration;
use gq_storage::FD_QUEUE;
use support::*;

const STALE_MS: i64 = 200_000;

#[test]
fn expired_jobs_are_failed_and_retried() {
    let mut harness = Harness::new("orphans_retried");
    let stale = harness.running("acq-1");
    let stale_id = id(&stale);
    let fresh = harness.running("acq-2");
    harness.backdate(&stale_id, STALE_MS);

    assert_eq!(harness.queue.scan_for_orphans().expect("scan"), 1);
    assert_eq!(harness.job(&stale_id).state, JobState::Failed);
    assert_eq!(harness.job(&id(&fresh)).state, JobState::Running);

    let retry_id = harness
        .queue
        .store()
        .job_retry_of(&stale_id)
        .expect("lookup")
        .expect("retried");
    assert_eq!(harness.job(&retry_id).state, JobState::Pending);

    let logs = harness.queue.logs(&stale_id).expect("logs");
    let lines: Vec<(i32, &str)> = logs.iter().map(|e| (e.fd, e.msg.as_str())).collect();
    let retried = format!("Retried job as {retry_id}.");
    assert_eq!(
        lines,
        vec![
            (FD_QUEUE, "The job did not report in for a long time and was canceled."),
            (FD_QUEUE, retried.as_str()),
        ]
    );

    assert_eq!(harness.queue.scan_for_orphans().expect("rescan"), 0);
}

#[test]
fn ticketed_jobs_are_not_reaped() {
    let mut harness = Harness::new("orphans_ticketed");
    let job_id = id(&harness.running("acq-1"));
    harness
        .queue
        .store_mut()
        .job_ticket_create(&job_id)
        .expect("ticket");
    harness.backdate(&job_id, STALE_MS);

    assert_eq!(harness.queue.scan_for_orphans().expect("scan"), 0);
    assert_eq!(harness.job(&job_id).state, JobState::Running);
}

#[test]
fn expired_tickets_do_not_shield_jobs() {
    let config = QueueConfig {
        ticket_ttl: Duration::from_secs(60),
        ..QueueConfig::default()
    };
    let mut harness = Harness::with("orphans_expired_ticket", Catalog::default(), config);
    let job_id = id(&harness.running("acq-1"));
    harness
        .queue
        .store_mut()
        .job_ticket_create(&job_id)
        .expect("ticket");
    harness.backdate(&job_id, STALE_MS);
    harness.backdate_tickets(&job_id, 24 * 60 * 60 * 1000);

    assert_eq!(harness.queue.scan_for_orphans().expect("scan"), 1);
    assert_eq!(harness.job(&job_id).state, JobState::Failed);
    assert_eq!(
        harness.queue.store().job_tickets_find(&job_id).expect("tickets").len(),
        1
    );
}

#[test]
fn already_retried_orphan_still_settles_its_batch() {
    let mut harness = Harness::new("orphans_already_retried");
    let proposal = BatchProposal {
        destinations: vec![session("ses-1")],
        ..BatchProposal::default()
    };
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal, None)
        .expect("create");
    harness.queue.batch_run(&batch.id, None).expect("run");
    let running = harness.queue.start_job(&[]).expect("start").expect("claimed");
    let job_id = id(&running);

    let mut successor = running.clone();
    successor.id = None;
    successor.request = None;
    successor.batch = None;
    successor.attempt = 2;
    successor.previous_job_id = Some(job_id.clone());
    harness
        .queue
        .store_mut()
        .job_insert(&successor)
        .expect("insert successor");
    harness.backdate(&job_id, STALE_MS);

    assert_eq!(harness.queue.scan_for_orphans().expect("scan"), 1);
    let logs = harness.queue.logs(&job_id).expect("logs");
    assert_eq!(
        logs.last().map(|entry| entry.msg.as_str()),
        Some("Job was already retried.")
    );
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").state,
        BatchState::Failed
    );
}

#[test]
fn last_attempt_fails_permanently() {
    let config = QueueConfig {
        max_attempts: 1,
        ..QueueConfig::default()
    };
    let mut harness = Harness::with("orphans_permanent", Catalog::default(), config);
    let job_id = id(&harness.running("acq-1"));
    harness.backdate(&job_id, STALE_MS);

    assert_eq!(harness.queue.scan_for_orphans().expect("scan"), 1);
    assert!(
        harness
            .queue
            .store()
            .job_retry_of(&job_id)
            .expect("lookup")
            .is_none()
    );
    let logs = harness.queue.logs(&job_id).expect("logs");
    assert_eq!(
        logs.last().map(|entry| entry.msg.as_str()),
        Some("Job permanently failed after 1 attempts.")
    );
}

#[test]
fn concurrent_reapers_fail_each_job_once() {
    let mut harness = Harness::new("orphans_concurrent");
    let mut stale = Vec::new();
    for n in 0..6 {
        let job_id = id(&harness.running(&format!("acq-{n}")));
        harness.backdate(&job_id, STALE_MS);
        stale.push(job_id);
    }

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let dir = harness.storage_dir.clone();
            std::thread::spawn(move || {
                let mut queue = Harness::worker(&dir, QueueConfig::default());
                queue.scan_for_orphans().expect("scan")
            })
        })
        .collect();
    let reaped: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("reaper thread"))
        .sum();

    assert_eq!(reaped, stale.len());
    for job_id in &stale {
        assert_eq!(harness.job(job_id).state, JobState::Failed);
        assert!(
            harness
                .queue
                .store()
                .job_retry_of(job_id)
                .expect("lookup")
                .is_some()
        );
    }
    assert_eq!(harness.queue.get_pending(&[]).expect("pending"), 6);
}
