#![forbid(unsafe_code)]

mod support;

use gq_core::{BatchProposal, BatchState, JobMutation, JobState, Origin};
use gq_queue::{Catalog, QueueConfig, QueueError};
use std::collections::BTreeMap;
use support::*;

fn proposal() -> BatchProposal {
    BatchProposal {
        tags: vec!["study-7".to_string()],
        inputs: ["acq-1", "acq-2"]
            .into_iter()
            .map(|acq| BTreeMap::from([("dicom".to_string(), acquisition_file(acq))]))
            .collect(),
        destinations: vec![session("ses-1")],
        ..BatchProposal::default()
    }
}

fn finish_all(harness: &mut Harness, state: JobState) {
    while let Some(job) = harness.queue.start_job(&[]).expect("start") {
        harness
            .queue
            .mutate(&job, &JobMutation::state(state), None)
            .expect("finish job");
    }
}

#[test]
fn run_enqueues_tagged_jobs() {
    let mut harness = Harness::new("batch_run");
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal(), Some(Origin::user("ann@example.org")))
        .expect("create");
    assert_eq!(batch.state, BatchState::Pending);

    let jobs = harness.queue.batch_run(&batch.id, None).expect("run");
    assert_eq!(jobs.len(), 3);
    for job in &jobs {
        assert_eq!(job.batch.as_ref(), Some(&batch.id));
        assert!(job.tags.contains("batch"));
        assert!(job.tags.contains("study-7"));
        assert_eq!(job.origin, Some(Origin::user("ann@example.org")));
    }
    assert_eq!(jobs[2].destination, session("ses-1"));

    let running = harness.queue.batch_get(&batch.id).expect("get");
    assert_eq!(running.state, BatchState::Running);
    assert_eq!(
        running.jobs,
        jobs.iter().map(id).collect::<Vec<_>>()
    );
    assert_eq!(harness.queue.batch_check_state(&batch.id).expect("check"), None);

    let err = harness
        .queue
        .batch_run(&batch.id, None)
        .expect_err("second run");
    assert!(matches!(err, QueueError::Conflict(_)), "{err:?}");
    assert_eq!(harness.queue.get_pending(&[]).expect("pending"), 3);
}

#[test]
fn batch_settles_when_jobs_finish() {
    let mut harness = Harness::new("batch_settles");
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal(), None)
        .expect("create");
    harness.queue.batch_run(&batch.id, None).expect("run");

    finish_all(&mut harness, JobState::Complete);
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").state,
        BatchState::Complete
    );
}

#[test]
fn batch_fails_when_every_job_fails() {
    let config = QueueConfig {
        max_attempts: 1,
        ..QueueConfig::default()
    };
    let mut harness = Harness::with("batch_fails", Catalog::default(), config);
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal(), None)
        .expect("create");
    harness.queue.batch_run(&batch.id, None).expect("run");

    finish_all(&mut harness, JobState::Failed);
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").state,
        BatchState::Failed
    );
}

#[test]
fn retried_batch_job_takes_its_slot() {
    let mut harness = Harness::new("batch_retry_slot");
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal(), None)
        .expect("create");
    let jobs = harness.queue.batch_run(&batch.id, None).expect("run");

    let first = harness.queue.start_job(&[]).expect("start").expect("claimed");
    assert_eq!(first.id, jobs[0].id);
    let failed = harness
        .queue
        .mutate(&first, &JobMutation::state(JobState::Failed), None)
        .expect("fail");
    let retry_id = harness
        .queue
        .retry(&failed, false)
        .expect("retry")
        .expect("retry id");

    let reloaded = harness.queue.batch_get(&batch.id).expect("get");
    assert_eq!(reloaded.jobs[0], retry_id);
    assert_eq!(reloaded.jobs[1..], [id(&jobs[1]), id(&jobs[2])]);
    assert_eq!(harness.job(&retry_id).batch.as_ref(), Some(&batch.id));
}

#[test]
fn cancel_stops_pending_jobs() {
    let mut harness = Harness::new("batch_cancel");
    let batch = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal(), None)
        .expect("create");
    let jobs = harness.queue.batch_run(&batch.id, None).expect("run");
    harness.queue.start_job(&[]).expect("start").expect("claimed");

    assert_eq!(harness.queue.batch_cancel(&batch.id).expect("cancel"), 2);
    let states: Vec<JobState> = jobs.iter().map(|job| harness.job(&id(job)).state).collect();
    assert_eq!(
        states,
        vec![JobState::Running, JobState::Cancelled, JobState::Cancelled]
    );
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").state,
        BatchState::Cancelled
    );
    assert_eq!(harness.queue.batch_check_state(&batch.id).expect("check"), None);
}

#[test]
fn create_rejects_empty_proposal() {
    let mut harness = Harness::new("batch_empty");
    let err = harness
        .queue
        .batch_create(harness.gear.id.clone(), BatchProposal::default(), None)
        .expect_err("empty");
    assert!(matches!(err, QueueError::Validation { .. }), "{err:?}");

    let err = harness
        .queue
        .batch_get(&gq_core::BatchId::from_seq(7))
        .expect_err("unknown batch");
    assert!(matches!(err, QueueError::NotFound(_)), "{err:?}");
}

#[test]
fn preconstructed_jobs_run_as_given() {
    let mut harness = Harness::new("batch_preconstructed");
    let gear_id = harness.gear.id.clone();
    let proposal: BatchProposal = serde_json::from_value(serde_json::json!({
        "inputs": [{"dicom": {"type": "acquisition", "id": "acq-9", "name": "scan.dcm"}}],
        "preconstructed_jobs": [
            {
                "gear_id": gear_id,
                "inputs": {"dicom": {"type": "acquisition", "id": "acq-1", "name": "scan.dcm"}},
                "config": {"frac": 0.3},
                "tags": ["hand-made"],
            },
            {"gear_id": gear_id, "destination": {"type": "session", "id": "ses-1"}},
        ],
    }))
    .expect("proposal");
    let batch = harness
        .queue
        .batch_create(gear_id.clone(), proposal, None)
        .expect("create");

    let jobs = harness.queue.batch_run(&batch.id, None).expect("run");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].inputs["dicom"], acquisition_file("acq-1"));
    assert!(jobs[0].tags.contains("hand-made"));
    assert!(!jobs[0].tags.contains("batch"));
    assert_eq!(
        harness.queue.config_document(&id(&jobs[0])).expect("document")["config"]["frac"],
        serde_json::json!(0.3)
    );
    assert_eq!(jobs[1].destination, session("ses-1"));
    for job in &jobs {
        assert_eq!(job.batch.as_ref(), Some(&batch.id));
    }
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").jobs,
        jobs.iter().map(id).collect::<Vec<_>>()
    );

    finish_all(&mut harness, JobState::Complete);
    assert_eq!(
        harness.queue.batch_get(&batch.id).expect("get").state,
        BatchState::Complete
    );
}

#[test]
fn malformed_preconstructed_jobs_are_rejected_at_create() {
    let mut harness = Harness::new("batch_preconstructed_bad");
    let proposal: BatchProposal = serde_json::from_value(serde_json::json!({
        "preconstructed_jobs": [{"inputs": {}}],
    }))
    .expect("proposal");
    let err = harness
        .queue
        .batch_create(harness.gear.id.clone(), proposal, None)
        .expect_err("missing gear_id");
    match err {
        QueueError::Validation { key, .. } => {
            assert_eq!(key.as_deref(), Some("preconstructed_jobs"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
