#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Group,
    Project,
    Session,
    Acquisition,
    Collection,
    Analysis,
}

impl ContainerType {
    pub const ALL: [ContainerType; 6] = [
        ContainerType::Group,
        ContainerType::Project,
        ContainerType::Session,
        ContainerType::Acquisition,
        ContainerType::Collection,
        ContainerType::Analysis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Project => "project",
            Self::Session => "session",
            Self::Acquisition => "acquisition",
            Self::Collection => "collection",
            Self::Analysis => "analysis",
        }
    }

    /// Path segment used in resource uris.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Group => "groups",
            Self::Project => "projects",
            Self::Session => "sessions",
            Self::Acquisition => "acquisitions",
            Self::Collection => "collections",
            Self::Analysis => "analyses",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerType {
    type Err = UnknownContainerType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| UnknownContainerType(raw.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownContainerType(pub String);

impl fmt::Display for UnknownContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown container type {:?}", self.0)
    }
}

impl std::error::Error for UnknownContainerType {}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    #[serde(rename = "type")]
    pub kind: ContainerType,
    pub id: String,
}

impl ContainerRef {
    pub fn new(kind: ContainerType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A named file attached to a container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "type")]
    pub kind: ContainerType,
    pub id: String,
    pub name: String,
}

impl FileRef {
    pub fn new(kind: ContainerType, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn container(&self) -> ContainerRef {
        ContainerRef::new(self.kind, self.id.clone())
    }

    pub fn uri(&self) -> String {
        format!("/{}/{}/files/{}", self.kind.plural(), self.id, self.name)
    }
}
