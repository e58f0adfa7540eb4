#![forbid(unsafe_code)]

use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    let nanos = i128::from(ts_ms) * 1_000_000;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Serializes `value`, adding an RFC 3339 twin next to every `*_at_ms` or
/// `ts_ms` field at any depth.
pub(crate) fn render<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(value)?;
    stamp_times(&mut value);
    Ok(value)
}

fn stamp_times(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let stamps = time_fields(map);
            for nested in map.values_mut() {
                stamp_times(nested);
            }
            map.extend(stamps);
        }
        Value::Array(items) => items.iter_mut().for_each(stamp_times),
        _ => {}
    }
}

fn time_fields(map: &Map<String, Value>) -> Vec<(String, Value)> {
    map.iter()
        .filter_map(|(key, value)| {
            let name = key
                .strip_suffix("_ms")
                .filter(|stem| *stem == "ts" || stem.ends_with("_at"))?;
            let ms = value.as_i64()?;
            Some((name.to_string(), Value::String(ts_ms_to_rfc3339(ms))))
        })
        .collect()
}

pub(crate) fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
