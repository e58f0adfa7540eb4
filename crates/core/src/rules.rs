#![forbid(unsafe_code)]

//! Rules that turn a newly stored file into gear jobs.
//!
//! A rule fires when at least one `any` condition holds (or `any` is empty)
//! and every `all` condition holds.

use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    /// The file's type equals the parameter.
    #[serde(rename = "file.type")]
    FileType,
    /// The file name matches a shell glob.
    #[serde(rename = "file.name")]
    FileName,
    /// The parameter is one of the file's measurements.
    #[serde(rename = "file.measurements")]
    FileMeasurements,
    /// Some file in the container (this one included) has the parameter as its type.
    #[serde(rename = "container.has-type")]
    ContainerHasType,
}

/// One condition, written as `["file.type", "dicom"]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch(pub MatchKind, pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<RuleMatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<RuleMatch>,
    /// Name of the gear to run; the latest registered version is used.
    #[serde(alias = "alg")]
    pub gear: String,
    /// Input name -> file type picked from the container. Without it the
    /// triggering file feeds the gear's only input.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub inputs: Option<BTreeMap<String, String>>,
}

/// What a rule can see of one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleFile {
    pub name: String,
    pub kind: Option<String>,
    pub measurements: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleError {
    BadGlob { pattern: String, reason: String },
}

impl RuleError {
    pub fn message(&self) -> String {
        match self {
            Self::BadGlob { pattern, reason } => format!("invalid glob {pattern:?}: {reason}"),
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for RuleError {}

impl RuleMatch {
    pub fn eval(&self, file: &RuleFile, container_files: &[RuleFile]) -> Result<bool, RuleError> {
        let RuleMatch(kind, param) = self;
        Ok(match kind {
            MatchKind::FileType => file.kind.as_deref() == Some(param.as_str()),
            MatchKind::FileName => Glob::new(param)
                .map_err(|err| RuleError::BadGlob {
                    pattern: param.clone(),
                    reason: err.to_string(),
                })?
                .compile_matcher()
                .is_match(&file.name),
            MatchKind::FileMeasurements => file.measurements.iter().any(|m| m == param),
            MatchKind::ContainerHasType => std::iter::once(file)
                .chain(container_files)
                .any(|other| other.kind.as_deref() == Some(param.as_str())),
        })
    }
}

impl Rule {
    /// Whether this rule fires for `file`, given the other files of its container.
    pub fn eval(&self, file: &RuleFile, container_files: &[RuleFile]) -> Result<bool, RuleError> {
        if !self.any.is_empty() {
            let mut hit = false;
            for condition in &self.any {
                if condition.eval(file, container_files)? {
                    hit = true;
                    break;
                }
            }
            if !hit {
                return Ok(false);
            }
        }
        for condition in &self.all {
            if !condition.eval(file, container_files)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Checks every glob up front so a stored rule cannot fail later.
    pub fn validate(&self) -> Result<(), RuleError> {
        for RuleMatch(kind, param) in self.any.iter().chain(&self.all) {
            if *kind == MatchKind::FileName {
                Glob::new(param).map_err(|err| RuleError::BadGlob {
                    pattern: param.clone(),
                    reason: err.to_string(),
                })?;
            }
        }
        Ok(())
    }
}
