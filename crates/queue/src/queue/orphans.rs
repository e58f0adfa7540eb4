#![forbid(unsafe_code)]

use super::Queue;
use crate::{ContainerResolver, QueueError};
use gq_core::JobId;
use gq_core::time::now_ms;
use gq_storage::StaleJobsRequest;
use tracing::{debug, info, warn};

pub const ORPHAN_LOG_LINE: &str = "The job did not report in for a long time and was canceled.";
pub const ALREADY_RETRIED_LOG_LINE: &str = "Job was already retried.";

impl<R: ContainerResolver> Queue<R> {
    /// Fails and retries running jobs whose heartbeat expired.
    ///
    /// Jobs holding a ticket younger than `ticket_ttl` are left alone. A job that changed since it was
    /// observed is skipped, so concurrent reapers never double-handle a job.
    /// Returns how many jobs this call failed.
    pub fn scan_for_orphans(&mut self) -> Result<usize, QueueError> {
        let now = now_ms();
        let cutoff_ms = now.saturating_sub(self.config.heartbeat_timeout_ms());
        let tickets_since_ms = now.saturating_sub(self.config.ticket_ttl_ms());
        let mut seen: Vec<JobId> = Vec::new();
        let mut reaped = 0;

        loop {
            let candidates = self.store.jobs_stale_running(StaleJobsRequest {
                cutoff_ms,
                exclude: seen.clone(),
                limit: self.config.orphan_scan_batch,
            })?;
            if candidates.is_empty() {
                break;
            }

            for candidate in candidates {
                seen.push(candidate.id.clone());
                if !self
                    .store
                    .job_tickets_since(&candidate.id, tickets_since_ms)?
                    .is_empty()
                {
                    debug!(job_id = %candidate.id, "stale job holds an active ticket; skipping");
                    continue;
                }
                let Some(failed) = self
                    .store
                    .job_fail_stale(&candidate.id, candidate.modified_at_ms)?
                else {
                    debug!(job_id = %candidate.id, "stale job changed before it could be failed");
                    continue;
                };

                reaped += 1;
                warn!(job_id = %candidate.id, "job missed its heartbeat; failing it");
                self.log_best_effort(&candidate.id, ORPHAN_LOG_LINE);

                let note = match self.retry(&failed, false) {
                    Ok(Some(retry_id)) => format!("Retried job as {retry_id}."),
                    Ok(None) => format!("Job permanently failed after {} attempts.", failed.attempt),
                    Err(QueueError::Conflict(reason)) => {
                        info!(job_id = %candidate.id, %reason, "orphan already retried");
                        ALREADY_RETRIED_LOG_LINE.to_string()
                    }
                    Err(err) => return Err(err),
                };
                self.log_best_effort(&candidate.id, &note);
                self.settle_batch_best_effort(&failed);
            }
        }

        Ok(reaped)
    }
}
