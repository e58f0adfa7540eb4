#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::util::add_column_if_missing;
use rusqlite::Connection;

pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    // Databases created before submitters were recorded.
    add_column_if_missing(conn, "jobs", "origin_json", "TEXT")?;
    add_column_if_missing(conn, "batches", "origin_json", "TEXT")?;
    Ok(())
}
