#![forbid(unsafe_code)]

use super::{Queue, job_error};
use crate::{ContainerResolver, QueueError};
use gq_core::Job;
use gq_storage::JobClaimRequest;
use tracing::debug;

impl<R: ContainerResolver> Queue<R> {
    /// Claims the next job and makes sure it carries an execution request.
    ///
    /// The priority pool (`now` set, newest first) is drained before the FIFO
    /// pool (oldest first). Both honor `tags` as "has any of". Returns `None`
    /// when nothing is eligible.
    pub fn start_job(&mut self, tags: &[String]) -> Result<Option<Job>, QueueError> {
        let mut claimed = self.store.job_claim_next(JobClaimRequest {
            tags: tags.to_vec(),
            priority: true,
        })?;
        if claimed.is_none() {
            claimed = self.store.job_claim_next(JobClaimRequest {
                tags: tags.to_vec(),
                priority: false,
            })?;
        }
        let Some(mut job) = claimed else {
            return Ok(None);
        };
        let Some(id) = job.id.clone() else {
            return Err(QueueError::validation("claimed job has no id"));
        };
        debug!(job_id = %id, attempt = job.attempt, "claimed job");

        if job.request.is_some() {
            return Ok(Some(job));
        }
        let gear = self.gear_for(&job.gear_id)?;
        let request = job
            .generate_request(&gear.manifest)
            .map_err(job_error)?
            .clone();
        Ok(Some(self.store.job_store_request(&id, &request)?))
    }
}
