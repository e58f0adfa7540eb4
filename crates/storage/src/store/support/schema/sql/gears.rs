#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS gears (
          seq INTEGER NOT NULL UNIQUE,
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          version TEXT,
          manifest_json TEXT NOT NULL,
          invalid INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS gear_rules (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          container_type TEXT,
          container_id TEXT,
          rule_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          CHECK ((container_type IS NULL) = (container_id IS NULL))
        );
"#;
