//! Key-value tables backing the Assistant Assembly pages.
//!
//! Prompts, function schemas and assistants share one row shape
//! ([`Record`]); each lives in its own SQLite table. Connections are opened
//! per operation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::db::{self, DbError, OptionalRow};
use crate::models::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Prompts,
    Functions,
    Assistants,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Prompts, Table::Functions, Table::Assistants];

    pub fn name(self) -> &'static str {
        match self {
            Table::Prompts => "prompts",
            Table::Functions => "functions",
            Table::Assistants => "assistants",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct KvTable {
    db_path: PathBuf,
    table: Table,
}

impl KvTable {
    pub fn new(db_path: impl Into<PathBuf>, table: Table) -> Self {
        Self { db_path: db_path.into(), table }
    }

    pub fn prompts(db_path: &Path) -> Self {
        Self::new(db_path, Table::Prompts)
    }

    pub fn functions(db_path: &Path) -> Self {
        Self::new(db_path, Table::Functions)
    }

    pub fn assistants(db_path: &Path) -> Self {
        Self::new(db_path, Table::Assistants)
    }

    pub fn table(&self) -> Table {
        self.table
    }

    fn connect(&self) -> Result<Connection, DbError> {
        db::connect(&self.db_path)
    }

    pub fn get(&self, id: &str) -> Result<Option<Record>, DbError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT id, name, value, used_by, updated_at FROM {} WHERE id = ?1",
            self.table.name()
        );
        let row = conn
            .query_row(&sql, [id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })
            .optional()?;
        row.map(into_record).transpose()
    }

    /// Like [`KvTable::get`] but a missing row is an error.
    pub fn require(&self, id: &str) -> Result<Record, DbError> {
        self.get(id)?.ok_or_else(|| DbError::NotFound {
            table: self.table.name(),
            id: id.to_string(),
        })
    }

    /// Insert or replace the whole row; `updated_at` is refreshed.
    pub fn put(&self, record: &Record) -> Result<Record, DbError> {
        let conn = self.connect()?;
        let mut saved = record.clone();
        saved.updated_at = now_iso();
        let used_by = serde_json::to_string(&saved.used_by)?;
        let sql = format!(
            "INSERT INTO {} (id, name, value, used_by, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, value=excluded.value,
             used_by=excluded.used_by, updated_at=excluded.updated_at",
            self.table.name()
        );
        conn.execute(&sql, (&saved.id, &saved.name, &saved.value, &used_by, &saved.updated_at))?;
        Ok(saved)
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool, DbError> {
        let conn = self.connect()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.table.name());
        let n = conn.execute(&sql, [id])?;
        Ok(n > 0)
    }

    pub fn scan(&self) -> Result<Vec<Record>, DbError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT id, name, value, used_by, updated_at FROM {} ORDER BY updated_at DESC, id",
            self.table.name()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?;

        let mut out = vec![];
        for row in rows {
            out.push(into_record(row?)?);
        }
        Ok(out)
    }

    /// Id -> name pairs for selectors.
    pub fn names(&self) -> Result<BTreeMap<ID, String>, DbError> {
        Ok(self.scan()?.into_iter().map(|r| (r.id, r.name)).collect())
    }

    pub fn add_used_by(&self, id: &str, assistant_id: &str) -> Result<Record, DbError> {
        let mut record = self.require(id)?;
        if !record.used_by.iter().any(|a| a == assistant_id) {
            record.used_by.push(assistant_id.to_string());
        }
        self.put(&record)
    }

    pub fn remove_used_by(&self, id: &str, assistant_id: &str) -> Result<Option<Record>, DbError> {
        let Some(mut record) = self.get(id)? else {
            return Ok(None);
        };
        record.used_by.retain(|a| a != assistant_id);
        self.put(&record).map(Some)
    }
}

fn into_record(row: (String, String, String, String, String)) -> Result<Record, DbError> {
    let (id, name, value, used_by, updated_at) = row;
    let used_by: Vec<ID> = serde_json::from_str(&used_by)?;
    Ok(Record { id, name, value, used_by, updated_at })
}

/// Write every table to `path` as `{ "<table>": [records] }`.
pub fn export_to_file(db_path: &Path, path: &Path) -> Result<usize, DbError> {
    let mut data: BTreeMap<&str, Vec<Record>> = BTreeMap::new();
    let mut total = 0;
    for table in Table::ALL {
        let records = KvTable::new(db_path, table).scan()?;
        total += records.len();
        data.insert(table.name(), records);
    }
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), records = total, "data dumped to file");
    Ok(total)
}

/// Restore a dump written by [`export_to_file`]. Missing file is a no-op.
pub fn import_from_file(db_path: &Path, path: &Path) -> Result<usize, DbError> {
    if !path.exists() {
        return Ok(0);
    }
    let raw = std::fs::read_to_string(path)?;
    let data: HashMap<String, Vec<Record>> = serde_json::from_str(&raw)?;
    let mut total = 0;
    for (table_name, records) in data {
        let Some(table) = Table::from_name(&table_name) else {
            tracing::warn!(table = %table_name, "skipping unknown table in dump");
            continue;
        };
        let kv = KvTable::new(db_path, table);
        for record in &records {
            kv.put(record)?;
            total += 1;
        }
    }
    tracing::info!(path = %path.display(), records = total, "loaded data from file");
    Ok(total)
}

// Settings

pub fn get_settings(db_path: &Path) -> Result<Vec<SettingsKV>, DbError> {
    let conn = db::connect(db_path)?;
    let mut stmt = conn.prepare("SELECT key, value, updated_at FROM settings ORDER BY key")?;
    let rows = stmt.query_map([], |r| {
        Ok(SettingsKV {
            key: r.get(0)?,
            value: r.get(1)?,
            updated_at: r.get(2)?,
        })
    })?;

    let mut out = vec![];
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_settings_map(db_path: &Path) -> Result<HashMap<String, String>, DbError> {
    Ok(get_settings(db_path)?.into_iter().map(|s| (s.key, s.value)).collect())
}

pub fn set_settings(db_path: &Path, pairs: &[SettingInput]) -> Result<(), DbError> {
    let mut conn = db::connect(db_path)?;
    let tx = conn.transaction()?;
    let updated_at = now_iso();

    for pair in pairs {
        tx.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
            (&pair.key, &pair.value, &updated_at),
        )?;
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("test.sqlite");
        init_db(&db_path).unwrap();
        (temp, db_path)
    }

    #[test]
    fn test_put_get_delete() {
        let (_temp, db_path) = setup();
        let prompts = KvTable::prompts(&db_path);

        assert!(prompts.get("p1").unwrap().is_none());
        prompts.put(&Record::new("p1", "Greeter", "Say hi.")).unwrap();

        let got = prompts.get("p1").unwrap().unwrap();
        assert_eq!(got.name, "Greeter");
        assert_eq!(got.value, "Say hi.");
        assert!(got.used_by.is_empty());

        assert!(prompts.delete("p1").unwrap());
        assert!(!prompts.delete("p1").unwrap());
        assert!(prompts.get("p1").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_existing_row() {
        let (_temp, db_path) = setup();
        let functions = KvTable::functions(&db_path);
        functions.put(&Record::new("f1", "old", "{}")).unwrap();
        functions.put(&Record::new("f1", "new", "{\"name\":\"x\"}")).unwrap();

        let all = functions.scan().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "new");
    }

    #[test]
    fn test_tables_are_isolated() {
        let (_temp, db_path) = setup();
        KvTable::prompts(&db_path).put(&Record::new("same", "prompt", "p")).unwrap();
        assert!(KvTable::functions(&db_path).get("same").unwrap().is_none());
        assert_eq!(KvTable::prompts(&db_path).names().unwrap().get("same").unwrap(), "prompt");
    }

    #[test]
    fn test_used_by_bookkeeping() {
        let (_temp, db_path) = setup();
        let prompts = KvTable::prompts(&db_path);
        prompts.put(&Record::new("p1", "Prompt", "text")).unwrap();

        prompts.add_used_by("p1", "asst_1").unwrap();
        prompts.add_used_by("p1", "asst_1").unwrap();
        prompts.add_used_by("p1", "asst_2").unwrap();
        assert_eq!(prompts.require("p1").unwrap().used_by, vec!["asst_1", "asst_2"]);

        prompts.remove_used_by("p1", "asst_1").unwrap();
        assert_eq!(prompts.require("p1").unwrap().used_by, vec!["asst_2"]);

        assert!(prompts.remove_used_by("missing", "asst_2").unwrap().is_none());
        assert!(matches!(prompts.add_used_by("missing", "asst_2"), Err(DbError::NotFound { .. })));
    }

    #[test]
    fn test_export_import_round_trip() {
        let (temp, db_path) = setup();
        KvTable::prompts(&db_path).put(&Record::new("p1", "Prompt", "text")).unwrap();
        KvTable::functions(&db_path).put(&Record::new("f1", "fn", "{}")).unwrap();

        let dump = temp.path().join("dump.json");
        assert_eq!(export_to_file(&db_path, &dump).unwrap(), 2);

        let other = temp.path().join("other.sqlite");
        init_db(&other).unwrap();
        assert_eq!(import_from_file(&other, &dump).unwrap(), 2);
        assert_eq!(KvTable::prompts(&other).require("p1").unwrap().value, "text");
        assert_eq!(KvTable::functions(&other).require("f1").unwrap().name, "fn");
    }

    #[test]
    fn test_import_missing_file_is_noop() {
        let (temp, db_path) = setup();
        assert_eq!(import_from_file(&db_path, &temp.path().join("nope.json")).unwrap(), 0);
    }

    #[test]
    fn test_settings_upsert() {
        let (_temp, db_path) = setup();
        set_settings(
            &db_path,
            &[
                SettingInput { key: "model".into(), value: "gpt-4o".into() },
                SettingInput { key: "temperature".into(), value: "0.3".into() },
            ],
        )
        .unwrap();
        set_settings(&db_path, &[SettingInput { key: "model".into(), value: "gpt-4o-mini".into() }]).unwrap();

        let map = get_settings_map(&db_path).unwrap();
        assert_eq!(map.get("model").unwrap(), "gpt-4o-mini");
        assert_eq!(map.get("temperature").unwrap(), "0.3");
    }
}
