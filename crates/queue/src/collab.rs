#![forbid(unsafe_code)]

use crate::QueueError;
use gq_core::{ContainerRef, FileRef, Gear, GearId};
use gq_storage::SqliteStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The caller on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub superuser: bool,
}

impl Identity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            superuser: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Write access implies read access.
    pub fn grants(self, wanted: Access) -> bool {
        self == Access::Write || wanted == Access::Read
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Metadata of a stored file, copied into the job's config document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub info: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Classification axis -> values, e.g. `{"Intent": ["Structural"]}`.
    #[serde(default)]
    pub classification: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl FileInfo {
    /// Every classification value, flattened in axis order without duplicates.
    pub fn measurements(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for values in self.classification.values() {
            let values = match values {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            };
            for value in values {
                if let Some(value) = value.as_str()
                    && !out.iter().any(|seen| seen == value)
                {
                    out.push(value.to_string());
                }
            }
        }
        out
    }
}

/// A file as listed in its container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerFile {
    pub name: String,
    #[serde(default)]
    pub info: FileInfo,
}

/// Read access to the container hierarchy and its permission model.
pub trait ContainerResolver {
    /// Metadata for an existing file; `NotFound` otherwise.
    fn file(&self, file: &FileRef) -> Result<FileInfo, QueueError>;

    /// Every file stored directly in `container`.
    fn container_files(&self, _container: &ContainerRef) -> Result<Vec<ContainerFile>, QueueError> {
        Ok(Vec::new())
    }

    /// Enclosing containers, nearest first.
    fn ancestors(&self, _container: &ContainerRef) -> Result<Vec<ContainerRef>, QueueError> {
        Ok(Vec::new())
    }

    /// `Forbidden` unless `identity` holds `access` on the file's container.
    fn check_file_access(
        &self,
        identity: &Identity,
        file: &FileRef,
        access: Access,
    ) -> Result<(), QueueError> {
        self.check_container_access(identity, &file.container(), access)
    }

    fn check_container_access(
        &self,
        identity: &Identity,
        container: &ContainerRef,
        access: Access,
    ) -> Result<(), QueueError>;
}

/// Gear lookup by id.
pub trait GearRegistry {
    fn gear(&self, id: &GearId) -> Result<Option<Gear>, QueueError>;
}

impl GearRegistry for SqliteStore {
    fn gear(&self, id: &GearId) -> Result<Option<Gear>, QueueError> {
        Ok(self.gear_get(id)?)
    }
}
