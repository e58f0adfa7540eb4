#![forbid(unsafe_code)]
#![allow(dead_code)]

use gq_core::{ContainerRef, ContainerType, FileRef, Gear, GearManifest, Job, JobId, JobMutation, JobState};
use gq_queue::{Catalog, EnqueueRequest, Queue, QueueConfig};
use gq_storage::SqliteStore;
use rusqlite::{Connection, params};
use serde_json::json;
use std::path::{Path, PathBuf};

pub(crate) fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("gq_queue_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub(crate) fn manifest() -> GearManifest {
    serde_json::from_value(json!({
        "name": "dcm2niix",
        "version": "1.0.0",
        "inputs": {
            "dicom": { "base": "file" },
            "mask": { "base": "file", "description": "optional mask" },
        },
        "config": {
            "frac": { "type": "number", "minimum": 0, "maximum": 1, "default": 0.5 },
            "mode": { "type": "string", "enum": ["fast", "slow"], "optional": true },
        },
    }))
    .expect("manifest")
}

pub(crate) fn acquisition_file(acquisition: &str) -> FileRef {
    FileRef::new(ContainerType::Acquisition, acquisition, "scan.dcm")
}

pub(crate) fn session(id: &str) -> ContainerRef {
    ContainerRef::new(ContainerType::Session, id)
}

pub(crate) struct Harness {
    pub(crate) queue: Queue<Catalog>,
    pub(crate) gear: Gear,
    pub(crate) storage_dir: PathBuf,
}

impl Harness {
    pub(crate) fn new(test_name: &str) -> Self {
        Self::with(test_name, Catalog::default(), QueueConfig::default())
    }

    pub(crate) fn with(test_name: &str, catalog: Catalog, config: QueueConfig) -> Self {
        let storage_dir = temp_dir(test_name);
        let mut store = SqliteStore::open(&storage_dir).expect("open store");
        let gear = store.gear_insert(&manifest(), false).expect("insert gear");
        Self {
            queue: Queue::new(store, catalog, config),
            gear,
            storage_dir,
        }
    }

    /// A second queue over the same database, as another worker would open it.
    pub(crate) fn worker(storage_dir: &Path, config: QueueConfig) -> Queue<Catalog> {
        let store = SqliteStore::open(storage_dir).expect("open worker store");
        Queue::new(store, Catalog::default(), config)
    }

    pub(crate) fn request(&self, acquisition: &str) -> EnqueueRequest {
        let mut request = EnqueueRequest::new(self.gear.id.clone());
        request
            .inputs
            .insert("dicom".to_string(), acquisition_file(acquisition));
        request
    }

    pub(crate) fn enqueue(&mut self, acquisition: &str, tags: &[&str]) -> Job {
        let mut request = self.request(acquisition);
        request.tags = tags.iter().map(|tag| tag.to_string()).collect();
        self.queue.enqueue(request, None, None).expect("enqueue")
    }

    /// Enqueues and claims a job, leaving it `running`.
    pub(crate) fn running(&mut self, acquisition: &str) -> Job {
        let job = self.enqueue(acquisition, &[]);
        let claimed = self
            .queue
            .start_job(&[])
            .expect("start job")
            .expect("claimed job");
        assert_eq!(claimed.id, job.id);
        claimed
    }

    pub(crate) fn failed(&mut self, acquisition: &str) -> Job {
        let running = self.running(acquisition);
        self.queue
            .mutate(&running, &JobMutation::state(JobState::Failed), None)
            .expect("fail job")
    }

    pub(crate) fn job(&self, id: &JobId) -> Job {
        self.queue.load(id).expect("load job")
    }

    pub(crate) fn backdate(&self, id: &JobId, by_ms: i64) {
        let conn = Connection::open(self.queue.store().db_path()).expect("open raw connection");
        conn.execute(
            "UPDATE jobs SET modified_at_ms = modified_at_ms - ?2 WHERE id=?1",
            params![id.as_str(), by_ms],
        )
        .expect("backdate job");
    }

    pub(crate) fn backdate_tickets(&self, id: &JobId, by_ms: i64) {
        let conn = Connection::open(self.queue.store().db_path()).expect("open raw connection");
        conn.execute(
            "UPDATE job_tickets SET created_at_ms = created_at_ms - ?2 WHERE job_id=?1",
            params![id.as_str(), by_ms],
        )
        .expect("backdate tickets");
    }
}

pub(crate) fn id(job: &Job) -> JobId {
    job.id.clone().expect("job id")
}
