#![forbid(unsafe_code)]

use super::{Queue, job_error};
use crate::{Access, ContainerResolver, FileInfo, Identity, QueueError, validate_config};
use gq_core::{
    BatchId, ContainerRef, ENGINE_INPUT_DIR, FileRef, GearId, INPUT_BASE_FILE, Job, JobDraft,
    Origin, merge_defaults,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::info;

/// A producer's request to run a gear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub gear_id: GearId,
    #[serde(default)]
    pub inputs: BTreeMap<String, FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<ContainerRef>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub now: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchId>,
}

impl EnqueueRequest {
    pub fn new(gear_id: GearId) -> Self {
        Self {
            gear_id,
            inputs: BTreeMap::new(),
            destination: None,
            config: Map::new(),
            tags: Vec::new(),
            now: false,
            batch: None,
        }
    }
}

impl<R: ContainerResolver> Queue<R> {
    /// Validates a request against its gear, resolves inputs, and inserts a
    /// `pending` job.
    ///
    /// With an `identity`, inputs need read access and the destination needs
    /// write access; `now` is dropped unless the identity is a superuser.
    /// Without one the caller is trusted.
    pub fn enqueue(
        &mut self,
        request: EnqueueRequest,
        origin: Option<Origin>,
        identity: Option<&Identity>,
    ) -> Result<Job, QueueError> {
        let gear = self.gear_for(&request.gear_id)?;
        if gear.invalid {
            return Err(QueueError::invalid_key(
                format!("gear {} is marked invalid", gear.name),
                "gear_id",
            ));
        }

        for name in request.inputs.keys() {
            let Some(spec) = gear.manifest.inputs.get(name) else {
                return Err(QueueError::invalid_key(
                    format!("gear {} has no input named {name}", gear.name),
                    name.clone(),
                ));
            };
            if spec.base != INPUT_BASE_FILE {
                return Err(QueueError::invalid_key(
                    format!("input {name} has unsupported base {}", spec.base),
                    name.clone(),
                ));
            }
        }

        let config = merge_defaults(&gear.manifest, &request.config);
        validate_config(&gear.manifest, &config)?;

        let mut now = request.now;
        if let Some(identity) = identity {
            for file in request.inputs.values() {
                self.resolver
                    .check_file_access(identity, file, Access::Read)?;
            }
            if !identity.superuser {
                now = false;
            }
        }

        let mut projections = Map::new();
        for (name, file) in &request.inputs {
            let info = self.resolver.file(file)?;
            projections.insert(name.clone(), input_projection(name, file, &info));
        }

        let mut job = JobDraft::new(gear.id.clone(), gear.name.clone())
            .inputs(request.inputs)
            .destination(request.destination)
            .tags(request.tags)
            .now(now)
            .batch(request.batch)
            .origin(origin)
            .create()
            .map_err(job_error)?;

        if let Some(identity) = identity {
            self.resolver
                .check_container_access(identity, &job.destination, Access::Write)?;
        }

        job.config = Some(json!({
            "config": config,
            "inputs": projections,
            "destination": job.destination,
        }));

        let stored = self.store.job_insert(&job)?;
        if let Some(id) = stored.id.as_ref() {
            info!(job_id = %id, gear = %gear.name, destination = %stored.destination, "enqueued job");
        }
        Ok(stored)
    }
}

/// What a worker learns about one input from `config.json`.
fn input_projection(input_name: &str, file: &FileRef, info: &FileInfo) -> Value {
    json!({
        "base": INPUT_BASE_FILE,
        "hierarchy": file.container(),
        "location": {
            "name": file.name,
            "path": format!("{ENGINE_INPUT_DIR}/{input_name}/{}", file.name),
        },
        "object": {
            "info": info.info,
            "tags": info.tags,
            "classification": info.classification,
            "mimetype": info.mimetype,
            "type": info.kind,
            "modality": info.modality,
            "size": info.size,
            "measurements": info.measurements(),
        },
    })
}
