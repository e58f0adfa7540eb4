#![forbid(unsafe_code)]

use crate::ids::{BatchId, GearId, JobId};
use crate::job::Origin;
use crate::refs::{ContainerRef, FileRef};
use crate::state::BatchState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Work a batch will enqueue once run: one job per input map and per destination,
/// or the `preconstructed_jobs` verbatim when any are given.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProposal {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<BTreeMap<String, FileRef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<ContainerRef>,
    /// Complete enqueue requests, run as-is instead of `inputs`/`destinations`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preconstructed_jobs: Vec<Map<String, Value>>,
}

impl BatchProposal {
    pub fn job_count(&self) -> usize {
        if self.preconstructed_jobs.is_empty() {
            self.inputs.len() + self.destinations.len()
        } else {
            self.preconstructed_jobs.len()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub gear_id: GearId,
    pub state: BatchState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    pub proposal: BatchProposal,
    #[serde(default)]
    pub jobs: Vec<JobId>,
    pub created_at_ms: i64,
    pub modified_at_ms: i64,
}
