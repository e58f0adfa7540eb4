#![forbid(unsafe_code)]

mod batches;
mod core;
mod gears;
mod indexes;
mod jobs;
mod pragmas;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(pragmas::SQL);
    sql.push_str(core::SQL);
    sql.push_str(gears::SQL);
    sql.push_str(jobs::SQL);
    sql.push_str(batches::SQL);
    sql.push_str(indexes::SQL);
    sql
}
