#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_jobs_claim
          ON jobs(state, now, modified_at_ms, seq);
        CREATE INDEX IF NOT EXISTS idx_jobs_destination
          ON jobs(destination_type, destination_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_batch
          ON jobs(batch_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_previous_job
          ON jobs(previous_job_id) WHERE previous_job_id IS NOT NULL;

        CREATE INDEX IF NOT EXISTS idx_job_inputs_container
          ON job_inputs(container_type, container_id);
        CREATE INDEX IF NOT EXISTS idx_job_tags_tag
          ON job_tags(tag, job_id);
        CREATE INDEX IF NOT EXISTS idx_job_tickets_job
          ON job_tickets(job_id);
        CREATE INDEX IF NOT EXISTS idx_job_logs_job_seq
          ON job_logs(job_id, seq);

        CREATE INDEX IF NOT EXISTS idx_batch_jobs_job
          ON batch_jobs(job_id);
        CREATE INDEX IF NOT EXISTS idx_gears_name
          ON gears(name, seq);
        CREATE INDEX IF NOT EXISTS idx_gear_rules_container
          ON gear_rules(container_type, container_id, seq);
"#;
