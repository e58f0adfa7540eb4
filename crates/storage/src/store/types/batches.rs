#![forbid(unsafe_code)]

use gq_core::{BatchId, BatchProposal, BatchState, GearId, JobId, Origin};

#[derive(Clone, Debug)]
pub struct BatchCreateRequest {
    pub gear_id: GearId,
    pub origin: Option<Origin>,
    pub proposal: BatchProposal,
}

/// Moves a batch to `state` if it is in the required prior state.
#[derive(Clone, Debug)]
pub struct BatchTransitionRequest {
    pub id: BatchId,
    pub state: BatchState,
    /// Replaces the job list when set.
    pub jobs: Option<Vec<JobId>>,
}
