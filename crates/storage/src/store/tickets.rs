#![forbid(unsafe_code)]

use super::jobs::job_exists;
use super::*;
use gq_core::JobId;
use rusqlite::{TransactionBehavior, params};

impl SqliteStore {
    /// Records that a worker is actively finishing `job_id`.
    pub fn job_ticket_create(&mut self, job_id: &JobId) -> Result<JobTicket, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !job_exists(&tx, job_id)? {
            return Err(StoreError::UnknownId);
        }
        let created_at_ms = now_ms();
        tx.execute(
            "INSERT INTO job_tickets(job_id, created_at_ms) VALUES (?1, ?2)",
            params![job_id.as_str(), created_at_ms],
        )?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;
        Ok(JobTicket {
            seq,
            job_id: job_id.clone(),
            created_at_ms,
        })
    }

    pub fn job_tickets_find(&self, job_id: &JobId) -> Result<Vec<JobTicket>, StoreError> {
        self.job_tickets_since(job_id, i64::MIN)
    }

    /// Tickets created at or after `since_ms`; older ones have expired.
    pub fn job_tickets_since(
        &self,
        job_id: &JobId,
        since_ms: i64,
    ) -> Result<Vec<JobTicket>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, created_at_ms FROM job_tickets \
             WHERE job_id=?1 AND created_at_ms >= ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![job_id.as_str(), since_ms], |row| {
            Ok(JobTicket {
                seq: row.get(0)?,
                job_id: job_id.clone(),
                created_at_ms: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for ticket in rows {
            out.push(ticket?);
        }
        Ok(out)
    }
}
