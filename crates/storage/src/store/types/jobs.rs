#![forbid(unsafe_code)]

use gq_core::{ContainerRef, JobId, JobState, TagSet};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct JobClaimRequest {
    /// Only jobs carrying at least one of these tags are eligible. Empty means any.
    pub tags: Vec<String>,
    /// Priority pool (`now` set, newest first) instead of the FIFO pool.
    pub priority: bool,
}

/// Conditional write: applies only while the job is still in `expected_state`.
#[derive(Clone, Debug)]
pub struct JobUpdateRequest {
    pub id: JobId,
    pub expected_state: JobState,
    pub state: Option<JobState>,
    pub tags: Option<TagSet>,
    pub now: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct StaleJobRow {
    pub id: JobId,
    pub modified_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct StaleJobsRequest {
    pub cutoff_ms: i64,
    pub exclude: Vec<JobId>,
    pub limit: usize,
}

#[derive(Clone, Debug, Default)]
pub struct JobSearchRequest {
    /// All refs share one container type.
    pub containers: Vec<ContainerRef>,
    pub states: Vec<JobState>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    pub seq: i64,
    pub job_id: JobId,
    pub created_at_ms: i64,
}

pub type JobStateCounts = BTreeMap<JobState, u64>;
