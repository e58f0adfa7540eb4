#![forbid(unsafe_code)]

use super::*;
use gq_core::{Job, JobId, JobState};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

impl SqliteStore {
    /// Jobs whose destination or any input lives in one of `containers`,
    /// most recently modified first.
    pub fn jobs_search(&self, request: JobSearchRequest) -> Result<Vec<Job>, StoreError> {
        let Some(first) = request.containers.first() else {
            return Ok(Vec::new());
        };
        let kind = first.kind;
        if request.containers.iter().any(|c| c.kind != kind) {
            return Err(StoreError::InvalidInput("containers must share one type"));
        }

        let ids: Vec<SqlValue> = request
            .containers
            .iter()
            .map(|c| SqlValue::Text(c.id.clone()))
            .collect();
        let in_ids = placeholders(ids.len());
        let mut container_params = vec![SqlValue::Text(kind.as_str().to_string())];
        container_params.extend(ids.iter().cloned());
        container_params.push(SqlValue::Text(kind.as_str().to_string()));
        container_params.extend(ids);

        let mut filter = JobFilter::new();
        filter.clause(
            &format!(
                "((destination_type = ? AND destination_id IN ({in_ids})) \
                 OR EXISTS (SELECT 1 FROM job_inputs i WHERE i.job_id = jobs.id \
                 AND i.container_type = ? AND i.container_id IN ({in_ids})))"
            ),
            container_params,
        );
        if !request.states.is_empty() {
            filter.clause(
                &format!("state IN ({})", placeholders(request.states.len())),
                request
                    .states
                    .iter()
                    .map(|s| SqlValue::Text(s.as_str().to_string()))
                    .collect(),
            );
        }
        filter.any_tag(&request.tags);

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs {} ORDER BY modified_at_ms DESC, seq DESC",
            filter.where_sql()
        );
        self.query_jobs(&sql, filter.into_params())
    }

    /// Jobs for `ids` in the given order; unknown ids are skipped.
    pub fn jobs_get_many(&self, ids: &[JobId]) -> Result<Vec<Job>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id IN ({})",
            placeholders(ids.len())
        );
        let found = self.query_jobs(
            &sql,
            ids.iter().map(|id| SqlValue::Text(id.to_string())).collect(),
        )?;
        let mut out = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(job) = found.iter().find(|job| job.id.as_ref() == Some(id)) {
                out.push(job.clone());
            }
        }
        Ok(out)
    }

    /// Count per state over jobs carrying any of `tags` (all jobs when empty).
    /// Every state is present, zero-filled.
    pub fn jobs_state_counts(&self, tags: &[String]) -> Result<JobStateCounts, StoreError> {
        let mut filter = JobFilter::new();
        filter.any_tag(tags);
        let sql = format!(
            "SELECT state, COUNT(1) FROM jobs {} GROUP BY state",
            filter.where_sql()
        );

        let mut counts: JobStateCounts = JobState::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(filter.into_params()))?;
        while let Some(row) = rows.next()? {
            let state: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let state = state
                .parse::<JobState>()
                .map_err(|_| StoreError::InvalidInput("invalid job state row"))?;
            counts.insert(state, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }

    /// Distinct tags in use, sorted.
    pub fn jobs_tags_in_use(&self, tags: &[String]) -> Result<Vec<String>, StoreError> {
        let mut filter = JobFilter::new();
        filter.any_tag(tags);
        let sql = format!(
            "SELECT DISTINCT tag FROM job_tags WHERE job_id IN (SELECT id FROM jobs {}) ORDER BY tag ASC",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.into_params()), |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for tag in rows {
            out.push(tag?);
        }
        Ok(out)
    }

    pub fn jobs_recent_ids(
        &self,
        state: JobState,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut filter = JobFilter::new();
        filter.clause(
            "state = ?",
            vec![SqlValue::Text(state.as_str().to_string())],
        );
        filter.any_tag(tags);
        let sql = format!(
            "SELECT id FROM jobs {} ORDER BY modified_at_ms DESC, seq DESC LIMIT ?",
            filter.where_sql()
        );
        let mut sql_params = filter.into_params();
        sql_params.push(SqlValue::Integer(to_sqlite_i64(limit)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(sql_params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            out.push(
                JobId::try_new(id).map_err(|_| StoreError::InvalidInput("invalid job id row"))?,
            );
        }
        Ok(out)
    }

    /// Failed jobs that used up their attempts.
    pub fn jobs_permafailed_count(&self, max_attempts: u32, tags: &[String]) -> Result<u64, StoreError> {
        let mut filter = JobFilter::new();
        filter.clause("state = 'failed'", Vec::new());
        filter.clause(
            "attempt >= ?",
            vec![SqlValue::Integer(i64::from(max_attempts))],
        );
        filter.any_tag(tags);
        let sql = format!("SELECT COUNT(1) FROM jobs {}", filter.where_sql());
        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(filter.into_params()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn query_jobs(&self, sql: &str, sql_params: Vec<SqlValue>) -> Result<Vec<Job>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(sql_params), read_job_row)?;
        let mut out = Vec::new();
        for job in rows {
            out.push(job?);
        }
        Ok(out)
    }
}
