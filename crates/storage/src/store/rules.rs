#![forbid(unsafe_code)]

use super::*;
use gq_core::{ContainerRef, Rule};
use rusqlite::{TransactionBehavior, params};

impl SqliteStore {
    /// Registers a rule for `container`, or for every container when `None`.
    pub fn rule_insert(
        &mut self,
        container: Option<&ContainerRef>,
        rule: &Rule,
    ) -> Result<StoredRule, StoreError> {
        if rule.gear.trim().is_empty() {
            return Err(StoreError::InvalidInput("rule must name a gear"));
        }
        let rule_json = serde_json::to_string(rule)?;
        let created_at_ms = now_ms();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            r#"
            INSERT INTO gear_rules(container_type, container_id, rule_json, created_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                container.map(|c| c.kind.as_str()),
                container.map(|c| c.id.as_str()),
                rule_json,
                created_at_ms,
            ],
        )?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;
        Ok(StoredRule {
            seq,
            container: container.cloned(),
            rule: rule.clone(),
            created_at_ms,
        })
    }

    /// Rules that apply to a file stored under `scopes` (innermost first):
    /// each scope's own rules in scope order, then the global ones.
    pub fn rules_for(&self, scopes: &[ContainerRef]) -> Result<Vec<StoredRule>, StoreError> {
        let scoped_sql = format!(
            "SELECT {RULE_COLUMNS} FROM gear_rules \
             WHERE container_type=?1 AND container_id=?2 ORDER BY seq ASC"
        );
        let mut out = Vec::new();
        let mut stmt = self.conn.prepare(&scoped_sql)?;
        for scope in scopes {
            let rows = stmt.query_map(params![scope.kind.as_str(), scope.id], read_rule_row)?;
            for rule in rows {
                out.push(rule?);
            }
        }

        let global_sql = format!(
            "SELECT {RULE_COLUMNS} FROM gear_rules WHERE container_type IS NULL ORDER BY seq ASC"
        );
        let mut stmt = self.conn.prepare(&global_sql)?;
        let rows = stmt.query_map([], read_rule_row)?;
        for rule in rows {
            out.push(rule?);
        }
        Ok(out)
    }

    pub fn rules_list(&self) -> Result<Vec<StoredRule>, StoreError> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM gear_rules ORDER BY seq ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_rule_row)?;
        let mut out = Vec::new();
        for rule in rows {
            out.push(rule?);
        }
        Ok(out)
    }
}
