#![forbid(unsafe_code)]

use crate::gear::GearManifest;
use crate::ids::{BatchId, GearId, JobId};
use crate::refs::{ContainerRef, FileRef};
use crate::request::{
    DEFAULT_PATH, ENGINE_DIR, ENGINE_INPUT_DIR, ENGINE_OUTPUT_DIR, ExecutionRequest, RESOURCE_HTTP,
    Resource, Target, default_command,
};
use crate::state::JobState;
use crate::tags::TagSet;
use crate::time::now_ms;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    User,
    Device,
    System,
}

/// Who submitted a job or batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "type")]
    pub kind: OriginKind,
    pub id: String,
}

impl Origin {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: OriginKind::User,
            id: id.into(),
        }
    }

    pub fn system() -> Self {
        Self {
            kind: OriginKind::System,
            id: "system".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    pub gear_id: GearId,
    pub gear_name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, FileRef>,
    pub destination: ContainerRef,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    pub state: JobState,
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_job_id: Option<JobId>,
    pub created_at_ms: i64,
    pub modified_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ExecutionRequest>,
    #[serde(default)]
    pub now: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Job {
    /// Builds the engine request once. Later calls return the cached value.
    pub fn generate_request(
        &mut self,
        manifest: &GearManifest,
    ) -> Result<&ExecutionRequest, JobError> {
        let request = match self.request.take() {
            Some(request) => request,
            None => self.build_request(manifest)?,
        };
        Ok(self.request.insert(request))
    }

    fn build_request(&self, manifest: &GearManifest) -> Result<ExecutionRequest, JobError> {
        let mut inputs = Vec::with_capacity(self.inputs.len() + 2);
        if let Some(image) = manifest.image.as_deref() {
            inputs.push(Resource {
                kind: RESOURCE_HTTP.to_string(),
                uri: image.to_string(),
                location: "/".to_string(),
            });
        }
        if self.config.is_some() {
            let id = self.id.as_ref().ok_or(JobError::MissingId)?;
            inputs.push(Resource::scitran(
                format!("/jobs/{id}/config.json"),
                ENGINE_DIR,
            ));
        }
        for (input_name, file) in &self.inputs {
            inputs.push(Resource::scitran(
                file.uri(),
                format!("{ENGINE_INPUT_DIR}/{input_name}"),
            ));
        }

        let mut output_uri = format!(
            "/engine?level={}&id={}",
            self.destination.kind, self.destination.id
        );
        if let Some(id) = self.id.as_ref() {
            output_uri.push_str("&job=");
            output_uri.push_str(id.as_str());
        }

        let mut env = BTreeMap::from([("PATH".to_string(), DEFAULT_PATH.to_string())]);
        env.extend(
            manifest
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(ExecutionRequest {
            inputs,
            target: Target {
                command: manifest.command.clone().unwrap_or_else(default_command),
                env,
                dir: ENGINE_DIR.to_string(),
            },
            outputs: vec![Resource::scitran(output_uri, ENGINE_OUTPUT_DIR)],
        })
    }

    /// The document served to the engine as `config.json`.
    pub fn config_document(&self) -> Value {
        self.config.clone().unwrap_or_else(|| json!({}))
    }

    /// A fresh pending copy pointing back at this job.
    pub fn retry_draft(&self) -> Result<Job, JobError> {
        let previous = self.id.clone().ok_or(JobError::MissingId)?;
        let now = now_ms();
        Ok(Job {
            id: None,
            state: JobState::Pending,
            attempt: self.attempt.saturating_add(1),
            previous_job_id: Some(previous),
            created_at_ms: now,
            modified_at_ms: now,
            request: None,
            ..self.clone()
        })
    }
}

/// Builder for a job that has not been persisted yet.
#[derive(Clone, Debug)]
pub struct JobDraft {
    gear_id: GearId,
    gear_name: String,
    inputs: BTreeMap<String, FileRef>,
    destination: Option<ContainerRef>,
    tags: Vec<String>,
    config: Option<Value>,
    attempt: u32,
    previous_job_id: Option<JobId>,
    now: bool,
    batch: Option<BatchId>,
    origin: Option<Origin>,
}

impl JobDraft {
    pub fn new(gear_id: GearId, gear_name: impl Into<String>) -> Self {
        Self {
            gear_id,
            gear_name: gear_name.into(),
            inputs: BTreeMap::new(),
            destination: None,
            tags: Vec::new(),
            config: None,
            attempt: 1,
            previous_job_id: None,
            now: false,
            batch: None,
            origin: None,
        }
    }

    pub fn input(mut self, name: impl Into<String>, file: FileRef) -> Self {
        self.inputs.insert(name.into(), file);
        self
    }

    pub fn inputs(mut self, inputs: BTreeMap<String, FileRef>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn destination(mut self, destination: Option<ContainerRef>) -> Self {
        self.destination = destination;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn config(mut self, config: Option<Value>) -> Self {
        self.config = config;
        self
    }

    pub fn attempt(mut self, attempt: u32, previous_job_id: Option<JobId>) -> Self {
        self.attempt = attempt;
        self.previous_job_id = previous_job_id;
        self
    }

    pub fn now(mut self, now: bool) -> Self {
        self.now = now;
        self
    }

    pub fn batch(mut self, batch: Option<BatchId>) -> Self {
        self.batch = batch;
        self
    }

    pub fn origin(mut self, origin: Option<Origin>) -> Self {
        self.origin = origin;
        self
    }

    /// Validates lineage, derives the destination and tags. Does not persist.
    pub fn create(self) -> Result<Job, JobError> {
        if self.attempt == 0 {
            return Err(JobError::ZeroAttempt);
        }
        if (self.attempt > 1) != self.previous_job_id.is_some() {
            return Err(JobError::LineageMismatch {
                attempt: self.attempt,
            });
        }
        let destination = match self.destination {
            Some(destination) => destination,
            None => self
                .inputs
                .values()
                .next()
                .map(FileRef::container)
                .ok_or(JobError::NoDestination)?,
        };

        let mut tags: TagSet = self.tags.into_iter().collect();
        tags.insert(&self.gear_name);

        let now = now_ms();
        Ok(Job {
            id: None,
            gear_id: self.gear_id,
            gear_name: self.gear_name,
            inputs: self.inputs,
            destination,
            tags,
            config: self.config,
            state: JobState::Pending,
            attempt: self.attempt,
            previous_job_id: self.previous_job_id,
            created_at_ms: now,
            modified_at_ms: now,
            request: None,
            now: self.now,
            batch: self.batch,
            origin: self.origin,
        })
    }
}

/// Caller-requested changes to an open job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobMutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<bool>,
}

impl JobMutation {
    pub fn state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobError {
    NoDestination,
    ZeroAttempt,
    LineageMismatch { attempt: u32 },
    MissingId,
}

impl JobError {
    pub fn message(&self) -> String {
        match self {
            Self::NoDestination => "job has no destination and no inputs to derive one".to_string(),
            Self::ZeroAttempt => "job attempt must be at least 1".to_string(),
            Self::LineageMismatch { attempt } => format!(
                "previous_job_id must be set exactly when attempt > 1 (attempt {attempt})"
            ),
            Self::MissingId => "job must be persisted before a request with config is built".to_string(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for JobError {}
