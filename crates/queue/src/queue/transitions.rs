#![forbid(unsafe_code)]

use super::{Queue, job_error};
use crate::{ContainerResolver, Identity, QueueError};
use gq_core::{Job, JobId, JobMutation, JobState, TagSet};
use gq_storage::JobUpdateRequest;
use tracing::{info, warn};

impl<R: ContainerResolver> Queue<R> {
    /// Applies `changes` to an open job, keyed on the state the caller saw.
    ///
    /// A concurrent state change makes this a `Conflict`; nothing is written.
    /// With a non-superuser `identity`, touching `now` is `Forbidden`.
    pub fn mutate(
        &mut self,
        job: &Job,
        changes: &JobMutation,
        identity: Option<&Identity>,
    ) -> Result<Job, QueueError> {
        let Some(id) = job.id.as_ref() else {
            return Err(QueueError::validation("job has not been inserted"));
        };
        if changes.now.is_some()
            && let Some(identity) = identity
            && !identity.superuser
        {
            return Err(QueueError::Forbidden(format!(
                "{} may not change the priority of job {id}",
                identity.user_id
            )));
        }
        if !job.state.is_open() {
            return Err(QueueError::invalid_key(
                format!("job {id} is {} and can no longer change", job.state),
                "state",
            ));
        }
        if let Some(to) = changes.state
            && !job.state.can_transition_to(to)
        {
            return Err(QueueError::invalid_key(
                format!("job {id} cannot move from {} to {to}", job.state),
                "state",
            ));
        }

        let tags = changes.tags.as_ref().map(|tags| {
            let mut set: TagSet = tags.iter().collect();
            set.insert(&job.gear_name);
            set
        });
        let updated = self.store.job_update(JobUpdateRequest {
            id: id.clone(),
            expected_state: job.state,
            state: changes.state,
            tags,
            now: changes.now,
        })?;
        info!(job_id = %id, from = %job.state, to = %updated.state, "job updated");

        if updated.state == JobState::Failed
            && job.state != JobState::Failed
            && self.config.retry_on_fail
            && let Err(err) = self.retry(&updated, false)
        {
            warn!(job_id = %id, error = %err, "automatic retry failed");
        }
        if !updated.state.is_open() {
            self.settle_batch_best_effort(&updated);
        }
        Ok(updated)
    }

    /// Loads the job and applies `changes` against its current state.
    pub fn report(
        &mut self,
        id: &JobId,
        changes: &JobMutation,
        identity: Option<&Identity>,
    ) -> Result<Job, QueueError> {
        let job = self.load(id)?;
        self.mutate(&job, changes, identity)
    }

    /// Spawns the next attempt of a failed job.
    ///
    /// Returns `None` once the job used up its attempts, unless `force`.
    /// A job is retried at most once; the loser of a race gets `Conflict`.
    pub fn retry(&mut self, job: &Job, force: bool) -> Result<Option<JobId>, QueueError> {
        let Some(id) = job.id.as_ref() else {
            return Err(QueueError::validation("job has not been inserted"));
        };
        if job.state != JobState::Failed {
            return Err(QueueError::invalid_key(
                format!("job {id} is {}; only failed jobs can be retried", job.state),
                "state",
            ));
        }
        if job.attempt >= self.config.max_attempts && !force {
            info!(job_id = %id, attempts = job.attempt, "job permanently failed");
            return Ok(None);
        }

        let draft = job.retry_draft().map_err(job_error)?;
        let (retry, batch) = self.store.job_insert_retry(&draft)?;
        let Some(retry_id) = retry.id else {
            return Err(QueueError::validation("retry was stored without an id"));
        };
        info!(
            job_id = %id,
            retry_id = %retry_id,
            attempt = retry.attempt,
            batch = ?batch.as_ref().map(|b| b.as_str()),
            "retried job"
        );
        Ok(Some(retry_id))
    }
}
