#![forbid(unsafe_code)]

use crate::ids::GearId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

pub const INPUT_BASE_FILE: &str = "file";

/// Option keys that describe the option itself rather than the value.
const NON_SCHEMA_KEYS: &[&str] = &["optional"];

/// Registered analysis description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GearManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default)]
    pub config: BTreeMap<String, ConfigOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Root filesystem the engine unpacks before running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    #[serde(default = "default_input_base")]
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_input_base() -> String {
    INPUT_BASE_FILE.to_string()
}

/// One config option: JSON-Schema keywords plus `default` / `optional`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigOption(pub Map<String, Value>);

impl ConfigOption {
    pub fn default_value(&self) -> Option<&Value> {
        self.0.get("default")
    }

    pub fn is_optional(&self) -> bool {
        self.0
            .get("optional")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_required(&self) -> bool {
        self.default_value().is_none() && !self.is_optional()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gear {
    pub id: GearId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub manifest: GearManifest,
    #[serde(default)]
    pub invalid: bool,
    pub created_at_ms: i64,
}

/// Builds the JSON Schema a job config must satisfy.
pub fn derive_config_schema(manifest: &GearManifest) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, option) in &manifest.config {
        let mut schema = option.0.clone();
        for key in NON_SCHEMA_KEYS {
            schema.remove(*key);
        }
        properties.insert(name.clone(), Value::Object(schema));
        if option.is_required() {
            required.push(Value::String(name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Manifest defaults overlaid with caller values. Caller values always win.
pub fn merge_defaults(manifest: &GearManifest, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut merged: Map<String, Value> = manifest
        .config
        .iter()
        .filter_map(|(name, option)| {
            option
                .default_value()
                .map(|value| (name.clone(), value.clone()))
        })
        .collect();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
