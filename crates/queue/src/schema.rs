#![forbid(unsafe_code)]

use crate::QueueError;
use gq_core::{GearManifest, derive_config_schema};
use jsonschema::JSONSchema;
use jsonschema::error::ValidationErrorKind;
use serde_json::{Map, Value};

/// Checks a merged config against the schema derived from the manifest.
/// The first violation is reported with the offending key.
pub fn validate_config(manifest: &GearManifest, config: &Map<String, Value>) -> Result<(), QueueError> {
    let schema = derive_config_schema(manifest);
    let compiled = JSONSchema::compile(&schema).map_err(|err| {
        QueueError::validation(format!(
            "gear {} declares an unusable config schema: {err}",
            manifest.name
        ))
    })?;

    let instance = Value::Object(config.clone());
    let result = compiled.validate(&instance);
    let Err(mut errors) = result else {
        return Ok(());
    };
    let Some(error) = errors.next() else {
        return Ok(());
    };

    let key = match &error.kind {
        ValidationErrorKind::Required { property } => property.as_str().map(str::to_string),
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected.first().cloned(),
        _ => None,
    }
    .or_else(|| first_segment(&error.instance_path.to_string()));

    Err(QueueError::Validation {
        reason: format!("config is invalid: {error}"),
        key,
    })
}

fn first_segment(pointer: &str) -> Option<String> {
    pointer
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}
