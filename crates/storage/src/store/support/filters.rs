#![forbid(unsafe_code)]

use rusqlite::types::Value as SqlValue;

/// AND-joined WHERE clauses over `jobs` with positional parameters.
#[derive(Debug, Default)]
pub(in crate::store) struct JobFilter {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl JobFilter {
    pub(in crate::store) fn new() -> Self {
        Self::default()
    }

    pub(in crate::store) fn clause(&mut self, sql: &str, params: Vec<SqlValue>) {
        self.clauses.push(sql.to_string());
        self.params.extend(params);
    }

    /// Jobs carrying at least one of `tags`. No-op when `tags` is empty.
    pub(in crate::store) fn any_tag(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        let sql = format!(
            "EXISTS (SELECT 1 FROM job_tags t WHERE t.job_id = jobs.id AND t.tag IN ({}))",
            placeholders(tags.len())
        );
        self.clause(&sql, tags.iter().cloned().map(SqlValue::Text).collect());
    }

    pub(in crate::store) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            return String::new();
        }
        format!("WHERE {}", self.clauses.join(" AND "))
    }

    pub(in crate::store) fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

pub(in crate::store) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
