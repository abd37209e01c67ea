//! Durable record store: trait, key derivation, and backends.
//!
//! The store serves the last-known-good copy of every resource before the
//! first network round trip completes after a restart. Records are keyed by
//! `(owner, kind, record_id)`; cached collections are keyed by a digest of a
//! human-readable descriptor.

mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::Cacheable;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
  #[error("{0}")]
  Io(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A record read back from the store.
#[derive(Debug, Clone)]
pub struct Stored<T> {
  pub record: T,
  pub cached_at: DateTime<Utc>,
}

/// An ordered collection read back from the store.
#[derive(Debug, Clone)]
pub struct StoredList<T> {
  pub records: Vec<T>,
  pub cached_at: DateTime<Utc>,
}

/// Persistence capability required by the fetch layer.
///
/// Writes from concurrent fetchers are safe because keys are derived
/// deterministically from distinct `(owner, kind, id)` tuples.
pub trait RecordStore: Send + Sync + 'static {
  /// Write one record, replacing any previous copy.
  fn write<T: Cacheable>(&self, record: &T) -> Result<()>;

  /// Read one record back by its `(owner, id)` key.
  fn read<T: Cacheable>(&self, owner: &str, id: &str) -> Result<Option<Stored<T>>>;

  /// Replace the collection stored under `key`, preserving order.
  /// Every member is also written through as an individual record.
  fn write_list<T: Cacheable>(&self, key: &str, records: &[T]) -> Result<()>;

  /// Read a collection back in its stored order.
  fn read_list<T: Cacheable>(&self, key: &str) -> Result<Option<StoredList<T>>>;
}

/// Stable fixed-length key for a cached collection.
pub fn list_key(descriptor: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(descriptor.as_bytes());
  hex::encode(hasher.finalize())
}

/// Storage backend that persists nothing. Used when caching is disabled.
pub struct NoopStore;

impl RecordStore for NoopStore {
  fn write<T: Cacheable>(&self, _record: &T) -> Result<()> {
    Ok(())
  }

  fn read<T: Cacheable>(&self, _owner: &str, _id: &str) -> Result<Option<Stored<T>>> {
    Ok(None)
  }

  fn write_list<T: Cacheable>(&self, _key: &str, _records: &[T]) -> Result<()> {
    Ok(())
  }

  fn read_list<T: Cacheable>(&self, _key: &str) -> Result<Option<StoredList<T>>> {
    Ok(None)
  }
}
