#![forbid(unsafe_code)]

use crate::{Access, ContainerFile, ContainerResolver, FileInfo, Identity, QueueError};
use gq_core::{ContainerRef, FileRef};
use serde::{Deserialize, Serialize};

/// In-memory container directory, loadable from JSON.
///
/// Unless `strict` is set, files missing from the catalog resolve to empty
/// metadata and every identity may access every container.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub files: Vec<CatalogFile>,
    #[serde(default)]
    pub grants: Vec<CatalogGrant>,
    /// Child -> parent links of the container hierarchy.
    #[serde(default)]
    pub parents: Vec<CatalogParent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub container: ContainerRef,
    pub name: String,
    #[serde(default)]
    pub info: FileInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogGrant {
    pub user_id: String,
    pub container: ContainerRef,
    pub access: Access,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogParent {
    pub child: ContainerRef,
    pub parent: ContainerRef,
}

impl Catalog {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_file(mut self, file: &FileRef, info: FileInfo) -> Self {
        self.files.push(CatalogFile {
            container: file.container(),
            name: file.name.clone(),
            info,
        });
        self
    }

    pub fn with_parent(mut self, child: ContainerRef, parent: ContainerRef) -> Self {
        self.parents.push(CatalogParent { child, parent });
        self
    }

    pub fn with_grant(mut self, user_id: &str, container: ContainerRef, access: Access) -> Self {
        self.grants.push(CatalogGrant {
            user_id: user_id.to_string(),
            container,
            access,
        });
        self
    }
}

impl ContainerResolver for Catalog {
    fn file(&self, file: &FileRef) -> Result<FileInfo, QueueError> {
        let container = file.container();
        let found = self
            .files
            .iter()
            .find(|entry| entry.container == container && entry.name == file.name);
        match found {
            Some(entry) => Ok(entry.info.clone()),
            None if self.strict => Err(QueueError::NotFound(format!(
                "file {} in {container}",
                file.name
            ))),
            None => Ok(FileInfo::default()),
        }
    }

    fn container_files(&self, container: &ContainerRef) -> Result<Vec<ContainerFile>, QueueError> {
        Ok(self
            .files
            .iter()
            .filter(|entry| &entry.container == container)
            .map(|entry| ContainerFile {
                name: entry.name.clone(),
                info: entry.info.clone(),
            })
            .collect())
    }

    fn ancestors(&self, container: &ContainerRef) -> Result<Vec<ContainerRef>, QueueError> {
        let mut out: Vec<ContainerRef> = Vec::new();
        let mut current = container;
        while let Some(link) = self.parents.iter().find(|link| &link.child == current) {
            if &link.parent == container || out.contains(&link.parent) {
                break;
            }
            out.push(link.parent.clone());
            current = &link.parent;
        }
        Ok(out)
    }

    fn check_container_access(
        &self,
        identity: &Identity,
        container: &ContainerRef,
        access: Access,
    ) -> Result<(), QueueError> {
        if identity.superuser || !self.strict {
            return Ok(());
        }
        let granted = self.grants.iter().any(|grant| {
            grant.user_id == identity.user_id
                && &grant.container == container
                && grant.access.grants(access)
        });
        if granted {
            Ok(())
        } else {
            Err(QueueError::Forbidden(format!(
                "{} lacks {access} access to {container}",
                identity.user_id
            )))
        }
    }
}
