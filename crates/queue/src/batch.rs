#![forbid(unsafe_code)]

//! Batches: a proposal of many jobs for one gear, run and settled together.

use crate::{ContainerResolver, EnqueueRequest, Identity, Queue, QueueError, validate_config};
use gq_core::{Batch, BatchId, BatchProposal, BatchState, GearId, Job, JobMutation, JobState, Origin, merge_defaults};
use gq_storage::{BatchCreateRequest, BatchTransitionRequest};
use serde_json::Value;
use tracing::{info, warn};

pub const BATCH_TAG: &str = "batch";

impl<R: ContainerResolver> Queue<R> {
    /// Stores a `pending` batch after checking the gear and the shared config.
    pub fn batch_create(
        &mut self,
        gear_id: GearId,
        proposal: BatchProposal,
        origin: Option<Origin>,
    ) -> Result<Batch, QueueError> {
        let gear = self.gear_for(&gear_id)?;
        if gear.invalid {
            return Err(QueueError::invalid_key(
                format!("gear {} is marked invalid", gear.name),
                "gear_id",
            ));
        }
        if proposal.job_count() == 0 {
            return Err(QueueError::invalid_key(
                "batch proposes no inputs and no destinations",
                "proposal",
            ));
        }
        validate_config(&gear.manifest, &merge_defaults(&gear.manifest, &proposal.config))?;
        preconstructed_requests(&proposal.preconstructed_jobs)?;

        let batch = self.store.batch_insert(BatchCreateRequest {
            gear_id,
            origin,
            proposal,
        })?;
        info!(batch_id = %batch.id, gear = %gear.name, jobs = batch.proposal.job_count(), "created batch");
        Ok(batch)
    }

    pub fn batch_get(&self, id: &BatchId) -> Result<Batch, QueueError> {
        self.store
            .batch_get(id)?
            .ok_or_else(|| QueueError::NotFound(format!("batch {id}")))
    }

    /// Enqueues every proposed job and moves the batch to `running`.
    ///
    /// If another caller ran the batch first, the jobs enqueued here are
    /// cancelled and the call fails with `Conflict`.
    pub fn batch_run(&mut self, id: &BatchId, identity: Option<&Identity>) -> Result<Vec<Job>, QueueError> {
        let batch = self.batch_get(id)?;
        if batch.state != BatchState::Pending {
            return Err(QueueError::Conflict(format!(
                "batch {id} is {} and cannot be run",
                batch.state
            )));
        }

        let requests = if batch.proposal.preconstructed_jobs.is_empty() {
            self.container_requests(&batch)
        } else {
            let mut requests = preconstructed_requests(&batch.proposal.preconstructed_jobs)?;
            for request in &mut requests {
                request.batch = Some(batch.id.clone());
            }
            requests
        };

        let mut jobs = Vec::with_capacity(requests.len());
        for request in requests {
            match self.enqueue(request, batch.origin.clone(), identity) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    self.cancel_all(&jobs);
                    return Err(err);
                }
            }
        }
        let job_ids = jobs.iter().filter_map(|job| job.id.clone()).collect();

        match self.store.batch_transition(BatchTransitionRequest {
            id: id.clone(),
            state: BatchState::Running,
            jobs: Some(job_ids),
        }) {
            Ok(_) => {
                info!(batch_id = %id, jobs = jobs.len(), "batch running");
                Ok(jobs)
            }
            Err(err) => {
                self.cancel_all(&jobs);
                Err(err.into())
            }
        }
    }

    /// Cancels a running batch and then its pending jobs. Returns how many
    /// jobs were cancelled.
    pub fn batch_cancel(&mut self, id: &BatchId) -> Result<usize, QueueError> {
        let batch = self.store.batch_transition(BatchTransitionRequest {
            id: id.clone(),
            state: BatchState::Cancelled,
            jobs: None,
        })?;
        let jobs = self.store.jobs_get_many(&batch.jobs)?;

        let mut cancelled = 0;
        for job in jobs.iter().filter(|job| job.state == JobState::Pending) {
            match self.mutate(job, &JobMutation::state(JobState::Cancelled), None) {
                Ok(_) => cancelled += 1,
                Err(err) => {
                    info!(batch_id = %id, job_id = ?job.id, error = %err, "batch job not cancelled")
                }
            }
        }
        info!(batch_id = %id, cancelled, "cancelled batch");
        Ok(cancelled)
    }

    /// The state a running batch should settle into, if its jobs are done.
    ///
    /// `None` while any job is still open or the batch is not running. A batch
    /// completes when at least one job did not fail.
    pub fn batch_check_state(&self, id: &BatchId) -> Result<Option<BatchState>, QueueError> {
        let batch = self.batch_get(id)?;
        if batch.state != BatchState::Running {
            return Ok(None);
        }
        let jobs = self.store.jobs_get_many(&batch.jobs)?;
        if jobs.iter().any(|job| job.state.is_open()) {
            return Ok(None);
        }
        if jobs.iter().any(|job| job.state != JobState::Failed) {
            Ok(Some(BatchState::Complete))
        } else {
            Ok(Some(BatchState::Failed))
        }
    }

    /// Moves the job's batch to its final state once every job is done.
    pub(crate) fn settle_batch_best_effort(&mut self, job: &Job) {
        let Some(batch_id) = job.batch.as_ref() else {
            return;
        };
        let settled = self.batch_check_state(batch_id).and_then(|state| {
            let Some(state) = state else {
                return Ok(None);
            };
            self.store
                .batch_transition(BatchTransitionRequest {
                    id: batch_id.clone(),
                    state,
                    jobs: None,
                })
                .map(|batch| Some(batch.state))
                .map_err(QueueError::from)
        });
        match settled {
            Ok(Some(state)) => info!(batch_id = %batch_id, %state, "batch settled"),
            Ok(None) | Err(QueueError::Conflict(_)) => {}
            Err(err) => warn!(batch_id = %batch_id, error = %err, "failed to settle batch"),
        }
    }

    fn cancel_all(&mut self, jobs: &[Job]) {
        for job in jobs {
            if let Err(err) = self.mutate(job, &JobMutation::state(JobState::Cancelled), None) {
                warn!(job_id = ?job.id, error = %err, "failed to cancel batch job");
            }
        }
    }

    /// One request per proposed input map, then one per destination.
    fn container_requests(&self, batch: &Batch) -> Vec<EnqueueRequest> {
        let mut requests = Vec::with_capacity(batch.proposal.job_count());
        for inputs in &batch.proposal.inputs {
            let mut request = self.batch_request(batch);
            request.inputs = inputs.clone();
            requests.push(request);
        }
        for destination in &batch.proposal.destinations {
            let mut request = self.batch_request(batch);
            request.destination = Some(destination.clone());
            requests.push(request);
        }
        requests
    }

    fn batch_request(&self, batch: &Batch) -> EnqueueRequest {
        let mut request = EnqueueRequest::new(batch.gear_id.clone());
        request.config = batch.proposal.config.clone();
        request.tags = std::iter::once(BATCH_TAG.to_string())
            .chain(batch.proposal.tags.iter().cloned())
            .collect();
        request.batch = Some(batch.id.clone());
        request
    }
}

/// Parses the proposal's ready-made enqueue requests.
fn preconstructed_requests(
    jobs: &[serde_json::Map<String, Value>],
) -> Result<Vec<EnqueueRequest>, QueueError> {
    jobs.iter()
        .enumerate()
        .map(|(idx, job)| {
            serde_json::from_value(Value::Object(job.clone())).map_err(|err| {
                QueueError::invalid_key(
                    format!("preconstructed job {idx} is not an enqueue request: {err}"),
                    "preconstructed_jobs",
                )
            })
        })
        .collect()
}
