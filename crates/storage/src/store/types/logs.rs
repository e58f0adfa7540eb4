#![forbid(unsafe_code)]

use gq_core::JobId;
use serde::{Deserialize, Serialize};

/// File descriptor reserved for lines written by the queue itself.
pub const FD_QUEUE: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogLine {
    pub fd: i32,
    pub msg: String,
}

impl JobLogLine {
    pub fn queue(msg: impl Into<String>) -> Self {
        Self {
            fd: FD_QUEUE,
            msg: msg.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobLogEntry {
    pub seq: i64,
    pub job_id: JobId,
    pub ts_ms: i64,
    pub fd: i32,
    pub msg: String,
}
