#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENGINE_DIR: &str = "/flywheel/v0";
pub const ENGINE_OUTPUT_DIR: &str = "/flywheel/v0/output";
pub const ENGINE_INPUT_DIR: &str = "/flywheel/v0/input";
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

pub const RESOURCE_SCITRAN: &str = "scitran";
pub const RESOURCE_HTTP: &str = "http";

pub fn default_command() -> Vec<String> {
    vec![
        "bash".to_string(),
        "-c".to_string(),
        "rm -rf output; mkdir -p output; ./run; echo \"Exit was $?\"".to_string(),
    ]
}

/// Instructions handed to the engine that runs a claimed job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub inputs: Vec<Resource>,
    pub target: Target,
    pub outputs: Vec<Resource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
    pub location: String,
}

impl Resource {
    pub fn scitran(uri: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: RESOURCE_SCITRAN.to_string(),
            uri: uri.into(),
            location: location.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub dir: String,
}
