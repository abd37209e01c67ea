//! SQLite-backed record store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{RecordStore, Result, StoreError, Stored, StoredList};
use crate::models::Cacheable;

/// Schema for the record and collection caches.
const SCHEMA: &str = r#"
-- Individual records, serialized as JSON
CREATE TABLE IF NOT EXISTS record_cache (
    kind TEXT NOT NULL,
    owner TEXT NOT NULL,
    record_id TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (kind, owner, record_id)
);

-- Cached collection metadata
CREATE TABLE IF NOT EXISTS list_cache (
    list_key TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    result_count INTEGER NOT NULL
);

-- Collection membership (preserves order)
CREATE TABLE IF NOT EXISTS list_entries (
    list_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (list_key, position)
);
"#;

/// SQLite implementation of [`RecordStore`].
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StoreError::Io(format!("failed to create cache directory: {}", e)))?;
    }

    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)?;
    Self::from_connection(conn)
  }

  /// In-memory store; contents are dropped with the connection.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Io("could not determine data directory".into()))?;

    Ok(data_dir.join("omgdata").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock();
    conn.execute_batch(SCHEMA)?;
    Ok(())
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
    self
      .conn
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl RecordStore for SqliteStore {
  fn write<T: Cacheable>(&self, record: &T) -> Result<()> {
    let conn = self.lock();
    let data = serde_json::to_vec(record)?;

    conn.execute(
      "INSERT OR REPLACE INTO record_cache (kind, owner, record_id, data, cached_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![
        T::kind().as_str(),
        record.owner(),
        record.record_id(),
        data
      ],
    )?;

    Ok(())
  }

  fn read<T: Cacheable>(&self, owner: &str, id: &str) -> Result<Option<Stored<T>>> {
    let conn = self.lock();

    let mut stmt = conn.prepare(
      "SELECT data, cached_at FROM record_cache
       WHERE kind = ? AND owner = ? AND record_id = ?",
    )?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![T::kind().as_str(), owner, id], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match row {
      Some((data, cached_at)) => {
        let record: T = serde_json::from_slice(&data)?;
        Ok(Some(Stored {
          record,
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn write_list<T: Cacheable>(&self, key: &str, records: &[T]) -> Result<()> {
    let conn = self.lock();

    conn.execute("BEGIN TRANSACTION", [])?;

    let outcome = (|| -> Result<()> {
      conn.execute("DELETE FROM list_entries WHERE list_key = ?", params![key])?;

      conn.execute(
        "INSERT OR REPLACE INTO list_cache (list_key, kind, cached_at, result_count)
         VALUES (?, ?, datetime('now'), ?)",
        params![key, T::kind().as_str(), records.len()],
      )?;

      for (position, record) in records.iter().enumerate() {
        let data = serde_json::to_vec(record)?;

        conn.execute(
          "INSERT INTO list_entries (list_key, position, data) VALUES (?, ?, ?)",
          params![key, position, data],
        )?;

        // Write-through so single-record reads see list members too.
        conn.execute(
          "INSERT OR REPLACE INTO record_cache (kind, owner, record_id, data, cached_at)
           VALUES (?, ?, ?, ?, datetime('now'))",
          params![T::kind().as_str(), record.owner(), record.record_id(), data],
        )?;
      }

      Ok(())
    })();

    match outcome {
      Ok(()) => {
        conn.execute("COMMIT", [])?;
        Ok(())
      }
      Err(err) => {
        let _ = conn.execute("ROLLBACK", []);
        Err(err)
      }
    }
  }

  fn read_list<T: Cacheable>(&self, key: &str) -> Result<Option<StoredList<T>>> {
    let conn = self.lock();

    let cached_at: Option<String> = conn
      .prepare("SELECT cached_at FROM list_cache WHERE list_key = ? AND kind = ?")?
      .query_row(params![key, T::kind().as_str()], |row| row.get(0))
      .ok();

    let cached_at = match cached_at {
      Some(value) => parse_datetime(&value)?,
      None => return Ok(None),
    };

    let mut stmt = conn.prepare(
      "SELECT data FROM list_entries WHERE list_key = ? ORDER BY position",
    )?;

    let records: Vec<T> = stmt
      .query_map(params![key], |row| {
        let data: Vec<u8> = row.get(0)?;
        Ok(data)
      })?
      .filter_map(|r| r.ok())
      .filter_map(|data| serde_json::from_slice(&data).ok())
      .collect();

    Ok(Some(StoredList { records, cached_at }))
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| StoreError::Io(format!("failed to parse datetime '{}': {}", s, e)))
}
