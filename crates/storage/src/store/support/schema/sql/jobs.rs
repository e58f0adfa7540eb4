#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        -- `seq` is the insertion order and breaks ties between equal `modified_at_ms`.
        -- `inputs_json` / `tags_json` hold the ordered values; `job_inputs` / `job_tags`
        -- mirror them for filtering.
        CREATE TABLE IF NOT EXISTS jobs (
          seq INTEGER NOT NULL UNIQUE,
          id TEXT PRIMARY KEY,
          gear_id TEXT NOT NULL,
          gear_name TEXT NOT NULL,
          state TEXT NOT NULL,
          attempt INTEGER NOT NULL,
          previous_job_id TEXT,
          inputs_json TEXT NOT NULL,
          destination_type TEXT NOT NULL,
          destination_id TEXT NOT NULL,
          tags_json TEXT NOT NULL,
          config_json TEXT,
          request_json TEXT,
          now INTEGER NOT NULL DEFAULT 0,
          batch_id TEXT,
          origin_json TEXT,
          created_at_ms INTEGER NOT NULL,
          modified_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_inputs (
          job_id TEXT NOT NULL,
          input TEXT NOT NULL,
          container_type TEXT NOT NULL,
          container_id TEXT NOT NULL,
          name TEXT NOT NULL,
          PRIMARY KEY (job_id, input)
        );

        CREATE TABLE IF NOT EXISTS job_tags (
          job_id TEXT NOT NULL,
          tag TEXT NOT NULL,
          PRIMARY KEY (job_id, tag)
        );

        CREATE TABLE IF NOT EXISTS job_tickets (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          job_id TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_logs (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          job_id TEXT NOT NULL,
          ts_ms INTEGER NOT NULL,
          fd INTEGER NOT NULL,
          msg TEXT NOT NULL
        );
"#;
