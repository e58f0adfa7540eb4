#![forbid(unsafe_code)]

use super::super::StoredRule;
use gq_core::{
    Batch, BatchId, ContainerRef, ContainerType, Gear, GearId, GearManifest, Job, JobId,
};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

pub(in crate::store) const JOB_COLUMNS: &str = "id, gear_id, gear_name, state, attempt, \
     previous_job_id, inputs_json, destination_type, destination_id, tags_json, config_json, \
     request_json, now, batch_id, origin_json, created_at_ms, modified_at_ms";

pub(in crate::store) const BATCH_COLUMNS: &str =
    "id, gear_id, state, origin_json, proposal_json, created_at_ms, modified_at_ms";

pub(in crate::store) const GEAR_COLUMNS: &str =
    "id, name, version, manifest_json, invalid, created_at_ms";

pub(in crate::store) fn read_job_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        id: Some(parse_column(row, 0, |raw| JobId::try_new(raw))?),
        gear_id: parse_column(row, 1, |raw| GearId::try_new(raw))?,
        gear_name: row.get(2)?,
        state: parse_column(row, 3, |raw| raw.parse())?,
        attempt: row.get(4)?,
        previous_job_id: parse_optional_column(row, 5, |raw| JobId::try_new(raw))?,
        inputs: json_column(row, 6)?,
        destination: ContainerRef {
            kind: parse_column(row, 7, |raw| raw.parse())?,
            id: row.get(8)?,
        },
        tags: json_column(row, 9)?,
        config: optional_json_column(row, 10)?,
        request: optional_json_column(row, 11)?,
        now: row.get(12)?,
        batch: parse_optional_column(row, 13, |raw| BatchId::try_new(raw))?,
        origin: optional_json_column(row, 14)?,
        created_at_ms: row.get(15)?,
        modified_at_ms: row.get(16)?,
    })
}

/// Batch row without its job list; callers attach `jobs` from `batch_jobs`.
pub(in crate::store) fn read_batch_row(row: &Row<'_>) -> Result<Batch, rusqlite::Error> {
    Ok(Batch {
        id: parse_column(row, 0, |raw| BatchId::try_new(raw))?,
        gear_id: parse_column(row, 1, |raw| GearId::try_new(raw))?,
        state: parse_column(row, 2, |raw| raw.parse())?,
        origin: optional_json_column(row, 3)?,
        proposal: json_column(row, 4)?,
        jobs: Vec::new(),
        created_at_ms: row.get(5)?,
        modified_at_ms: row.get(6)?,
    })
}

pub(in crate::store) fn read_gear_row(row: &Row<'_>) -> Result<Gear, rusqlite::Error> {
    let manifest: GearManifest = json_column(row, 3)?;
    Ok(Gear {
        id: parse_column(row, 0, |raw| GearId::try_new(raw))?,
        name: row.get(1)?,
        version: row.get(2)?,
        manifest,
        invalid: row.get(4)?,
        created_at_ms: row.get(5)?,
    })
}

pub(in crate::store) const RULE_COLUMNS: &str =
    "seq, container_type, container_id, rule_json, created_at_ms";

pub(in crate::store) fn read_rule_row(row: &Row<'_>) -> Result<StoredRule, rusqlite::Error> {
    let kind: Option<ContainerType> = parse_optional_column(row, 1, |raw| raw.parse())?;
    let id: Option<String> = row.get(2)?;
    Ok(StoredRule {
        seq: row.get(0)?,
        container: kind.zip(id).map(|(kind, id)| ContainerRef { kind, id }),
        rule: json_column(row, 3)?,
        created_at_ms: row.get(4)?,
    })
}

fn parse_column<T, E, F>(row: &Row<'_>, idx: usize, parse: F) -> Result<T, rusqlite::Error>
where
    F: FnOnce(String) -> Result<T, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    parse(raw).map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn parse_optional_column<T, E, F>(
    row: &Row<'_>,
    idx: usize,
    parse: F,
) -> Result<Option<T>, rusqlite::Error>
where
    F: FnOnce(String) -> Result<T, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(parse)
        .transpose()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> Result<Option<T>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
