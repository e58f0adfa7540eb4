#![forbid(unsafe_code)]

//! Job log access and rendering.

use crate::{ContainerResolver, Queue, QueueError};
use gq_core::JobId;
use gq_storage::{FD_QUEUE, JobLogEntry, JobLogLine};

pub const NO_LOGS_MESSAGE: &str = "No logs were found for this job.";

impl<R: ContainerResolver> Queue<R> {
    pub fn logs(&self, id: &JobId) -> Result<Vec<JobLogEntry>, QueueError> {
        Ok(self.store.job_logs_get(id)?)
    }

    pub fn add_logs(&mut self, id: &JobId, lines: &[JobLogLine]) -> Result<usize, QueueError> {
        Ok(self.store.job_logs_add(id, lines)?)
    }
}

pub fn render_text(entries: &[JobLogEntry]) -> String {
    entries.iter().map(|entry| entry.msg.as_str()).collect()
}

/// One `<span>` per line, classed by file descriptor.
pub fn render_html(entries: &[JobLogEntry]) -> String {
    if entries.is_empty() {
        return format!("<span class=\"fd-{FD_QUEUE}\">{NO_LOGS_MESSAGE}</span>\n");
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "<span class=\"fd-{}\">{}</span>\n",
            entry.fd,
            escape_html(&entry.msg)
        ));
    }
    out
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: i64, fd: i32, msg: &str) -> JobLogEntry {
        JobLogEntry {
            seq,
            job_id: JobId::from_seq(1),
            ts_ms: 0,
            fd,
            msg: msg.to_string(),
        }
    }

    #[test]
    fn text_concatenates_messages() {
        let entries = vec![entry(1, 1, "starting\n"), entry(2, 2, "oops\n")];
        assert_eq!(render_text(&entries), "starting\noops\n");
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn html_wraps_each_line() {
        let entries = vec![entry(1, 1, "a < b"), entry(2, -1, "queue")];
        assert_eq!(
            render_html(&entries),
            "<span class=\"fd-1\">a &lt; b</span>\n<span class=\"fd--1\">queue</span>\n"
        );
    }

    #[test]
    fn html_reports_missing_logs() {
        assert_eq!(
            render_html(&[]),
            "<span class=\"fd--1\">No logs were found for this job.</span>\n"
        );
    }
}
