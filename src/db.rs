use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
  #[cfg(feature = "desktop")]
  #[error("tauri error: {0}")]
  Tauri(#[from] tauri::Error),
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("record not found: {table}/{id}")]
  NotFound { table: &'static str, id: String },
}

pub const DB_FILE_NAME: &str = "ai_stream.sqlite";

pub struct DbPaths {
  pub db_path: PathBuf,
  pub data_dir: PathBuf,
}

impl DbPaths {
  pub fn in_dir(data_dir: impl Into<PathBuf>) -> Result<Self, DbError> {
    let data_dir = data_dir.into();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join(DB_FILE_NAME);
    Ok(DbPaths { db_path, data_dir })
  }
}

#[cfg(feature = "desktop")]
pub fn paths(app: &tauri::AppHandle) -> Result<DbPaths, DbError> {
  use tauri::Manager;
  let app_data = app.path().app_data_dir().map_err(DbError::Tauri)?;
  DbPaths::in_dir(app_data)
}

pub fn connect(db_path: &Path) -> Result<Connection, DbError> {
  let conn = Connection::open(db_path)?;
  Ok(conn)
}

pub fn init_db(db_path: &Path) -> Result<(), DbError> {
  let conn = connect(db_path)?;
  // Apply migrations in order. Each uses IF NOT EXISTS for idempotency.
  let init_sql = include_str!("../migrations/001_init.sql");
  conn.execute_batch(init_sql)?;
  let settings_sql = include_str!("../migrations/002_settings.sql");
  conn.execute_batch(settings_sql)?;
  tracing::debug!(path = %db_path.display(), "database initialised");
  Ok(())
}

// needed for .optional()
pub(crate) trait OptionalRow<T> {
  fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalRow<T> for Result<T, rusqlite::Error> {
  fn optional(self) -> Result<Option<T>, rusqlite::Error> {
    match self {
      Ok(v) => Ok(Some(v)),
      Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
      Err(e) => Err(e),
    }
  }
}
