#![forbid(unsafe_code)]

use super::jobs::job_exists;
use super::*;
use gq_core::JobId;
use rusqlite::{TransactionBehavior, params};

const MAX_LOG_MSG_LEN: usize = 64 * 1024;

fn normalize_log_msg(msg: &str) -> Result<&str, StoreError> {
    if msg.len() > MAX_LOG_MSG_LEN {
        return Err(StoreError::InvalidInput("log message is too long"));
    }
    Ok(msg)
}

impl SqliteStore {
    /// Appends lines to a job's log. Returns how many were written.
    pub fn job_logs_add(&mut self, job_id: &JobId, lines: &[JobLogLine]) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !job_exists(&tx, job_id)? {
            return Err(StoreError::UnknownId);
        }
        let ts_ms = now_ms();
        for line in lines {
            tx.execute(
                "INSERT INTO job_logs(job_id, ts_ms, fd, msg) VALUES (?1, ?2, ?3, ?4)",
                params![job_id.as_str(), ts_ms, line.fd, normalize_log_msg(&line.msg)?],
            )?;
        }
        tx.commit()?;
        Ok(lines.len())
    }

    pub fn job_logs_get(&self, job_id: &JobId) -> Result<Vec<JobLogEntry>, StoreError> {
        if !job_exists(&self.conn, job_id)? {
            return Err(StoreError::UnknownId);
        }
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts_ms, fd, msg FROM job_logs WHERE job_id=?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![job_id.as_str()], |row| {
            Ok(JobLogEntry {
                seq: row.get(0)?,
                job_id: job_id.clone(),
                ts_ms: row.get(1)?,
                fd: row.get(2)?,
                msg: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for entry in rows {
            out.push(entry?);
        }
        Ok(out)
    }
}
