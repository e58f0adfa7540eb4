#![forbid(unsafe_code)]

use super::batches::substitute_batch_job_tx;
use super::*;
use gq_core::{BatchId, ExecutionRequest, Job, JobId, JobState, TagSet};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter};

impl SqliteStore {
    /// Persists a new job at `pending` and returns it with its allocated id.
    pub fn job_insert(&mut self, job: &Job) -> Result<Job, StoreError> {
        if let Some(id) = job.id.as_ref() {
            return Err(StoreError::AlreadyInserted {
                job_id: id.to_string(),
            });
        }
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = insert_job_tx(&tx, job)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Inserts a retry and, in the same transaction, puts it in its
    /// predecessor's batch slot. Returns the batch that was touched.
    pub fn job_insert_retry(&mut self, retry: &Job) -> Result<(Job, Option<BatchId>), StoreError> {
        if let Some(id) = retry.id.as_ref() {
            return Err(StoreError::AlreadyInserted {
                job_id: id.to_string(),
            });
        }
        let Some(previous) = retry.previous_job_id.as_ref() else {
            return Err(StoreError::InvalidInput("retry must reference previous_job_id"));
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(retry_id) = retry_of(&tx, previous)? {
            return Err(StoreError::AlreadyRetried {
                job_id: previous.to_string(),
                retry_id: retry_id.to_string(),
            });
        }
        let stored = insert_job_tx(&tx, retry)?;
        let Some(new_id) = stored.id.as_ref() else {
            return Err(StoreError::InvalidInput("inserted job has no id"));
        };
        let batch = substitute_batch_job_tx(&tx, previous, new_id)?;
        tx.commit()?;
        Ok((stored, batch))
    }

    pub fn job_get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        load_job(&self.conn, id)
    }

    pub fn job_retry_of(&self, id: &JobId) -> Result<Option<JobId>, StoreError> {
        retry_of(&self.conn, id)
    }

    /// Flips one eligible pending job to `running` with a single statement.
    ///
    /// Two callers can never receive the same job: the inner SELECT picks a
    /// candidate and the outer `state='pending'` predicate lets only one
    /// UPDATE match it.
    pub fn job_claim_next(&mut self, request: JobClaimRequest) -> Result<Option<Job>, StoreError> {
        let mut filter = JobFilter::new();
        filter.clause("state = 'pending'", Vec::new());
        filter.clause("now = ?", vec![SqlValue::Integer(i64::from(request.priority))]);
        filter.any_tag(&request.tags);

        let order = if request.priority {
            "modified_at_ms DESC, seq DESC"
        } else {
            "modified_at_ms ASC, seq ASC"
        };
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'running', modified_at_ms = ?
            WHERE id = (SELECT id FROM jobs {where_sql} ORDER BY {order} LIMIT 1)
              AND state = 'pending'
            RETURNING {JOB_COLUMNS}
            "#,
            where_sql = filter.where_sql(),
        );
        let mut sql_params = vec![SqlValue::Integer(now_ms())];
        sql_params.extend(filter.into_params());

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let claimed = tx
            .query_row(&sql, params_from_iter(sql_params), read_job_row)
            .optional()?;
        tx.commit()?;
        Ok(claimed)
    }

    /// Stores `request` unless one is already stored, then returns the job as
    /// persisted. Concurrent callers all observe the first request written.
    pub fn job_store_request(
        &mut self,
        id: &JobId,
        request: &ExecutionRequest,
    ) -> Result<Job, StoreError> {
        let request_json = serde_json::to_string(request)?;
        self.conn.execute(
            "UPDATE jobs SET request_json=?2 WHERE id=?1 AND request_json IS NULL",
            params![id.as_str(), request_json],
        )?;
        load_job(&self.conn, id)?.ok_or(StoreError::UnknownId)
    }

    /// Optimistic update keyed on id and the state the caller last saw.
    pub fn job_update(&mut self, request: JobUpdateRequest) -> Result<Job, StoreError> {
        let tags_json = request
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = COALESCE(?3, state),
                now = COALESCE(?4, now),
                tags_json = COALESCE(?5, tags_json),
                modified_at_ms = ?6
            WHERE id = ?1 AND state = ?2
            RETURNING {JOB_COLUMNS}
            "#
        );

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = tx
            .query_row(
                &sql,
                params![
                    request.id.as_str(),
                    request.expected_state.as_str(),
                    request.state.map(JobState::as_str),
                    request.now,
                    tags_json,
                    now_ms(),
                ],
                read_job_row,
            )
            .optional()?;
        let Some(job) = updated else {
            return Err(if job_exists(&tx, &request.id)? {
                StoreError::StateMismatch {
                    job_id: request.id.to_string(),
                    expected: request.expected_state.to_string(),
                }
            } else {
                StoreError::UnknownId
            });
        };
        if let Some(tags) = request.tags.as_ref() {
            tx.execute(
                "DELETE FROM job_tags WHERE job_id=?1",
                params![request.id.as_str()],
            )?;
            insert_job_tags_tx(&tx, &request.id, tags)?;
        }
        tx.commit()?;
        Ok(job)
    }

    /// Running jobs whose last touch is older than `cutoff_ms`, oldest first.
    pub fn jobs_stale_running(&self, request: StaleJobsRequest) -> Result<Vec<StaleJobRow>, StoreError> {
        let mut filter = JobFilter::new();
        filter.clause("state = 'running'", Vec::new());
        filter.clause("modified_at_ms < ?", vec![SqlValue::Integer(request.cutoff_ms)]);
        if !request.exclude.is_empty() {
            filter.clause(
                &format!("id NOT IN ({})", placeholders(request.exclude.len())),
                request
                    .exclude
                    .iter()
                    .map(|id| SqlValue::Text(id.to_string()))
                    .collect(),
            );
        }
        let sql = format!(
            "SELECT id, modified_at_ms FROM jobs {} ORDER BY modified_at_ms ASC, seq ASC LIMIT ?",
            filter.where_sql()
        );
        let mut sql_params = filter.into_params();
        sql_params.push(SqlValue::Integer(to_sqlite_i64(request.limit)?));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(sql_params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            out.push(StaleJobRow {
                id: JobId::try_new(id)
                    .map_err(|_| StoreError::InvalidInput("invalid job id row"))?,
                modified_at_ms: row.get(1)?,
            });
        }
        Ok(out)
    }

    /// Fails a running job only if nobody touched it since `observed_modified_ms`.
    pub fn job_fail_stale(
        &mut self,
        id: &JobId,
        observed_modified_ms: i64,
    ) -> Result<Option<Job>, StoreError> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET state = 'failed', modified_at_ms = ?3
            WHERE id = ?1 AND state = 'running' AND modified_at_ms = ?2
            RETURNING {JOB_COLUMNS}
            "#
        );
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let failed = tx
            .query_row(
                &sql,
                params![id.as_str(), observed_modified_ms, now_ms()],
                read_job_row,
            )
            .optional()?;
        tx.commit()?;
        Ok(failed)
    }
}

fn insert_job_tx(tx: &Transaction<'_>, job: &Job) -> Result<Job, StoreError> {
    let seq = next_counter_tx(tx, JOB_COUNTER)?;
    let id = JobId::from_seq(seq);
    let now = now_ms();

    let mut stored = job.clone();
    stored.id = Some(id.clone());
    stored.state = JobState::Pending;
    stored.created_at_ms = now;
    stored.modified_at_ms = now;

    let inputs_json = serde_json::to_string(&stored.inputs)?;
    let tags_json = serde_json::to_string(&stored.tags)?;
    let config_json = stored
        .config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let request_json = stored
        .request
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let origin_json = stored
        .origin
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let insert = tx.execute(
        r#"
        INSERT INTO jobs(
          seq, id, gear_id, gear_name, state, attempt, previous_job_id, inputs_json,
          destination_type, destination_id, tags_json, config_json, request_json,
          now, batch_id, origin_json, created_at_ms, modified_at_ms
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
        params![
            seq,
            id.as_str(),
            stored.gear_id.as_str(),
            stored.gear_name,
            stored.state.as_str(),
            stored.attempt,
            stored.previous_job_id.as_ref().map(JobId::as_str),
            inputs_json,
            stored.destination.kind.as_str(),
            stored.destination.id,
            tags_json,
            config_json,
            request_json,
            stored.now,
            stored.batch.as_ref().map(BatchId::as_str),
            origin_json,
            stored.created_at_ms,
            stored.modified_at_ms,
        ],
    );
    if let Err(err) = insert {
        return Err(map_retry_conflict(tx, stored.previous_job_id.as_ref(), err));
    }

    for (input, file) in &stored.inputs {
        tx.execute(
            r#"
            INSERT INTO job_inputs(job_id, input, container_type, container_id, name)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![id.as_str(), input, file.kind.as_str(), file.id, file.name],
        )?;
    }
    insert_job_tags_tx(tx, &id, &stored.tags)?;

    Ok(stored)
}

fn insert_job_tags_tx(tx: &Transaction<'_>, id: &JobId, tags: &TagSet) -> Result<(), StoreError> {
    for tag in tags {
        tx.execute(
            "INSERT OR IGNORE INTO job_tags(job_id, tag) VALUES (?1, ?2)",
            params![id.as_str(), tag],
        )?;
    }
    Ok(())
}

/// A unique-index hit on `previous_job_id` means someone else retried first.
fn map_retry_conflict(conn: &Connection, previous: Option<&JobId>, err: rusqlite::Error) -> StoreError {
    if !is_constraint_violation(&err) {
        return StoreError::Sql(err);
    }
    let Some(previous) = previous else {
        return StoreError::Sql(err);
    };
    match retry_of(conn, previous) {
        Ok(Some(retry_id)) => StoreError::AlreadyRetried {
            job_id: previous.to_string(),
            retry_id: retry_id.to_string(),
        },
        _ => StoreError::Sql(err),
    }
}

pub(super) fn load_job(conn: &Connection, id: &JobId) -> Result<Option<Job>, StoreError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id=?1");
    Ok(conn
        .query_row(&sql, params![id.as_str()], read_job_row)
        .optional()?)
}

pub(super) fn job_exists(conn: &Connection, id: &JobId) -> Result<bool, StoreError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM jobs WHERE id=?1",
            params![id.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn retry_of(conn: &Connection, id: &JobId) -> Result<Option<JobId>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT id FROM jobs WHERE previous_job_id=?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|raw| JobId::try_new(raw).map_err(|_| StoreError::InvalidInput("invalid job id row")))
        .transpose()
}
