#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("unknown id")]
    UnknownId,
    #[error("job {job_id} has already been inserted")]
    AlreadyInserted { job_id: String },
    #[error("job {job_id} is no longer {expected}")]
    StateMismatch { job_id: String, expected: String },
    #[error("job {job_id} has already been retried as {retry_id}")]
    AlreadyRetried { job_id: String, retry_id: String },
    #[error("batch {batch_id} must be {expected} for this transition")]
    BatchStateMismatch { batch_id: String, expected: String },
}
