#![forbid(unsafe_code)]

use super::Queue;
use crate::{ContainerResolver, QueueError};
use gq_core::{ContainerRef, Job, JobId, JobState};
use gq_storage::JobSearchRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    /// Count only jobs carrying any of these tags.
    pub tags: Vec<String>,
    /// Add up to this many recently modified job ids per state.
    pub last: Option<usize>,
    /// Add the distinct tags in use.
    pub unique: bool,
    /// Add the permanently failed count.
    pub all: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobStatistics {
    pub states: BTreeMap<JobState, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent: Option<BTreeMap<JobState, Vec<JobId>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permafailed: Option<u64>,
}

impl<R: ContainerResolver> Queue<R> {
    /// Jobs touching any of `containers` as input or destination, newest first.
    pub fn search(
        &self,
        containers: &[ContainerRef],
        states: &[JobState],
        tags: &[String],
    ) -> Result<Vec<Job>, QueueError> {
        if let Some(first) = containers.first()
            && containers.iter().any(|c| c.kind != first.kind)
        {
            return Err(QueueError::invalid_key(
                "containers must all be of one type",
                "containers",
            ));
        }
        Ok(self.store.jobs_search(JobSearchRequest {
            containers: containers.to_vec(),
            states: states.to_vec(),
            tags: tags.to_vec(),
        })?)
    }

    pub fn get_statistics(&self, query: &StatsQuery) -> Result<JobStatistics, QueueError> {
        let states = self.store.jobs_state_counts(&query.tags)?;

        let tags = if query.unique {
            Some(self.store.jobs_tags_in_use(&query.tags)?)
        } else {
            None
        };

        let recent = match query.last {
            Some(limit) => {
                let mut recent = BTreeMap::new();
                for state in JobState::ALL {
                    recent.insert(state, self.store.jobs_recent_ids(state, &query.tags, limit)?);
                }
                Some(recent)
            }
            None => None,
        };

        let permafailed = if query.all {
            Some(
                self.store
                    .jobs_permafailed_count(self.config.max_attempts, &query.tags)?,
            )
        } else {
            None
        };

        Ok(JobStatistics {
            states,
            tags,
            recent,
            permafailed,
        })
    }

    pub fn get_pending(&self, tags: &[String]) -> Result<u64, QueueError> {
        let counts = self.store.jobs_state_counts(tags)?;
        Ok(counts.get(&JobState::Pending).copied().unwrap_or(0))
    }
}
