#![forbid(unsafe_code)]

mod dispatch;
mod enqueue;
mod orphans;
mod stats;
mod transitions;

pub use enqueue::*;
pub use stats::*;

use crate::{ContainerResolver, GearRegistry, QueueConfig, QueueError};
use gq_core::{Gear, GearId, Job, JobError, JobId};
use gq_storage::{JobLogLine, SqliteStore};
use serde_json::Value;
use tracing::warn;

/// Job queue policy over a shared [`SqliteStore`].
///
/// Every operation is a short sequence of conditional store statements, so any
/// number of `Queue`s (threads or processes) may work the same database.
pub struct Queue<R> {
    pub(crate) store: SqliteStore,
    pub(crate) resolver: R,
    pub(crate) config: QueueConfig,
}

impl<R: ContainerResolver> Queue<R> {
    pub fn new(store: SqliteStore, resolver: R, config: QueueConfig) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn load(&self, id: &JobId) -> Result<Job, QueueError> {
        self.store
            .job_get(id)?
            .ok_or_else(|| QueueError::NotFound(format!("job {id}")))
    }

    /// The document a worker downloads as the job's `config.json`.
    pub fn config_document(&self, id: &JobId) -> Result<Value, QueueError> {
        Ok(self.load(id)?.config_document())
    }

    pub(crate) fn gear_for(&self, id: &GearId) -> Result<Gear, QueueError> {
        self.store
            .gear(id)?
            .ok_or_else(|| QueueError::NotFound(format!("gear {id}")))
    }

    /// Appends a queue-authored log line. Failures are logged, never returned.
    pub(crate) fn log_best_effort(&mut self, job_id: &JobId, msg: &str) {
        if let Err(err) = self.store.job_logs_add(job_id, &[JobLogLine::queue(msg)]) {
            warn!(job_id = %job_id, error = %err, "failed to append job log");
        }
    }
}

pub(crate) fn job_error(err: JobError) -> QueueError {
    match err {
        JobError::NoDestination => QueueError::invalid_key(err.message(), "destination"),
        JobError::ZeroAttempt | JobError::LineageMismatch { .. } => {
            QueueError::invalid_key(err.message(), "attempt")
        }
        JobError::MissingId => QueueError::validation(err.message()),
    }
}
