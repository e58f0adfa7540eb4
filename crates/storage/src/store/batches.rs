#![forbid(unsafe_code)]

use super::*;
use gq_core::{Batch, BatchId, BatchState, JobId};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

impl SqliteStore {
    pub fn batch_insert(&mut self, request: BatchCreateRequest) -> Result<Batch, StoreError> {
        let proposal_json = serde_json::to_string(&request.proposal)?;
        let origin_json = request
            .origin
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seq = next_counter_tx(&tx, BATCH_COUNTER)?;
        let now = now_ms();
        let batch = Batch {
            id: BatchId::from_seq(seq),
            gear_id: request.gear_id,
            state: BatchState::Pending,
            origin: request.origin,
            proposal: request.proposal,
            jobs: Vec::new(),
            created_at_ms: now,
            modified_at_ms: now,
        };
        tx.execute(
            r#"
            INSERT INTO batches(seq, id, gear_id, state, origin_json, proposal_json, created_at_ms, modified_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                seq,
                batch.id.as_str(),
                batch.gear_id.as_str(),
                batch.state.as_str(),
                origin_json,
                proposal_json,
                batch.created_at_ms,
                batch.modified_at_ms,
            ],
        )?;
        tx.commit()?;
        Ok(batch)
    }

    pub fn batch_get(&self, id: &BatchId) -> Result<Option<Batch>, StoreError> {
        load_batch(&self.conn, id)
    }

    /// Conditional batch state change, optionally replacing the job list.
    pub fn batch_transition(&mut self, request: BatchTransitionRequest) -> Result<Batch, StoreError> {
        let Some(prior) = request.state.required_prior() else {
            return Err(StoreError::InvalidInput("a batch cannot return to pending"));
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE batches SET state=?2, modified_at_ms=?3 WHERE id=?1 AND state=?4",
            params![
                request.id.as_str(),
                request.state.as_str(),
                now_ms(),
                prior.as_str(),
            ],
        )?;
        if changed != 1 {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM batches WHERE id=?1",
                    params![request.id.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            return Err(if exists {
                StoreError::BatchStateMismatch {
                    batch_id: request.id.to_string(),
                    expected: prior.to_string(),
                }
            } else {
                StoreError::UnknownId
            });
        }

        if let Some(jobs) = request.jobs.as_deref() {
            tx.execute(
                "DELETE FROM batch_jobs WHERE batch_id=?1",
                params![request.id.as_str()],
            )?;
            for (position, job_id) in jobs.iter().enumerate() {
                tx.execute(
                    "INSERT INTO batch_jobs(batch_id, position, job_id) VALUES (?1, ?2, ?3)",
                    params![request.id.as_str(), to_sqlite_i64(position)?, job_id.as_str()],
                )?;
            }
        }

        let batch = load_batch(&tx, &request.id)?.ok_or(StoreError::UnknownId)?;
        tx.commit()?;
        Ok(batch)
    }
}

/// Swaps `old` for `new` in whichever batch lists `old`, keeping its position.
pub(super) fn substitute_batch_job_tx(
    tx: &Transaction<'_>,
    old: &JobId,
    new: &JobId,
) -> Result<Option<BatchId>, StoreError> {
    let batch_id: Option<String> = tx
        .query_row(
            "SELECT batch_id FROM batch_jobs WHERE job_id=?1",
            params![old.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(batch_id) = batch_id else {
        return Ok(None);
    };
    tx.execute(
        "UPDATE batch_jobs SET job_id=?2 WHERE job_id=?1",
        params![old.as_str(), new.as_str()],
    )?;
    tx.execute(
        "UPDATE batches SET modified_at_ms=?2 WHERE id=?1",
        params![batch_id, now_ms()],
    )?;
    let batch_id =
        BatchId::try_new(batch_id).map_err(|_| StoreError::InvalidInput("invalid batch id row"))?;
    Ok(Some(batch_id))
}

fn load_batch(conn: &Connection, id: &BatchId) -> Result<Option<Batch>, StoreError> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id=?1");
    let Some(mut batch) = conn
        .query_row(&sql, params![id.as_str()], read_batch_row)
        .optional()?
    else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT job_id FROM batch_jobs WHERE batch_id=?1 ORDER BY position ASC")?;
    let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;
    for job_id in rows {
        batch.jobs.push(
            JobId::try_new(job_id?).map_err(|_| StoreError::InvalidInput("invalid job id row"))?,
        );
    }
    Ok(Some(batch))
}
