#![forbid(unsafe_code)]

mod counters;
mod filters;
mod rows;
mod schema;

pub(super) use counters::*;
pub(super) use filters::*;
pub(super) use gq_core::time::now_ms;
pub(super) use rows::*;
pub(super) use schema::migrate_sqlite_schema;
