#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS batches (
          seq INTEGER NOT NULL UNIQUE,
          id TEXT PRIMARY KEY,
          gear_id TEXT NOT NULL,
          state TEXT NOT NULL,
          origin_json TEXT,
          proposal_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          modified_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS batch_jobs (
          batch_id TEXT NOT NULL,
          position INTEGER NOT NULL,
          job_id TEXT NOT NULL,
          PRIMARY KEY (batch_id, position)
        );
"#;
