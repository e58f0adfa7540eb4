#![forbid(unsafe_code)]

use gq_core::{ContainerRef, Rule};
use serde::Serialize;

/// A rule as registered. Without a container it applies everywhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredRule {
    pub seq: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerRef>,
    pub rule: Rule,
    pub created_at_ms: i64,
}
