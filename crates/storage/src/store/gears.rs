#![forbid(unsafe_code)]

use super::*;
use gq_core::{Gear, GearId, GearManifest};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

const MAX_GEAR_NAME_LEN: usize = 128;

fn normalize_gear_name(raw: &str) -> Result<String, StoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(StoreError::InvalidInput("gear name must not be empty"));
    }
    if raw.len() > MAX_GEAR_NAME_LEN {
        return Err(StoreError::InvalidInput("gear name is too long"));
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StoreError::InvalidInput(
            "gear name may only contain [A-Za-z0-9._-]",
        ));
    }
    Ok(raw.to_string())
}

impl SqliteStore {
    /// Registers a manifest. Re-registering a name adds a newer version.
    pub fn gear_insert(&mut self, manifest: &GearManifest, invalid: bool) -> Result<Gear, StoreError> {
        let name = normalize_gear_name(&manifest.name)?;
        let mut manifest = manifest.clone();
        manifest.name = name.clone();
        let manifest_json = serde_json::to_string(&manifest)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seq = next_counter_tx(&tx, GEAR_COUNTER)?;
        let gear = Gear {
            id: GearId::from_seq(seq),
            name,
            version: manifest.version.clone(),
            manifest,
            invalid,
            created_at_ms: now_ms(),
        };
        tx.execute(
            r#"
            INSERT INTO gears(seq, id, name, version, manifest_json, invalid, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                seq,
                gear.id.as_str(),
                gear.name,
                gear.version,
                manifest_json,
                gear.invalid,
                gear.created_at_ms,
            ],
        )?;
        tx.commit()?;
        Ok(gear)
    }

    pub fn gear_get(&self, id: &GearId) -> Result<Option<Gear>, StoreError> {
        let sql = format!("SELECT {GEAR_COLUMNS} FROM gears WHERE id=?1");
        Ok(self
            .conn
            .query_row(&sql, params![id.as_str()], read_gear_row)
            .optional()?)
    }

    /// Most recently registered gear with this name.
    pub fn gear_get_by_name(&self, name: &str) -> Result<Option<Gear>, StoreError> {
        let sql = format!("SELECT {GEAR_COLUMNS} FROM gears WHERE name=?1 ORDER BY seq DESC LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![name.trim()], read_gear_row)
            .optional()?)
    }

    /// Latest version of every registered gear, by name.
    pub fn gears_list(&self) -> Result<Vec<Gear>, StoreError> {
        let sql = format!(
            r#"
            SELECT {GEAR_COLUMNS} FROM gears
            WHERE seq IN (SELECT MAX(seq) FROM gears GROUP BY name)
            ORDER BY name ASC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], read_gear_row)?;
        let mut out = Vec::new();
        for gear in rows {
            out.push(gear?);
        }
        Ok(out)
    }
}
