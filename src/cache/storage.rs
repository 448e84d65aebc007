//! Durable storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::entry::{CacheEntry, Partition, Tier};

/// Trait for durable storage backends.
///
/// Calls are synchronous; the cache engine moves them onto the blocking
/// pool. The engine is the only caller.
pub trait DurableStorage: Send + Sync {
  /// Get an entry by key. Expiry is not evaluated here.
  fn get(&self, partition: Partition, key: &str) -> Result<Option<CacheEntry>>;

  /// Insert or replace an entry.
  fn put(&self, partition: Partition, entry: &CacheEntry) -> Result<()>;

  /// Delete an entry. Deleting a missing key is not an error.
  fn delete(&self, partition: Partition, key: &str) -> Result<()>;

  /// Delete every entry in a partition.
  fn clear(&self, partition: Partition) -> Result<()>;

  /// Flush pending writes before the handle is dropped.
  fn flush(&self) -> Result<()> {
    Ok(())
  }
}

/// Storage implementation that doesn't persist anything.
/// Used when the durable tier is unavailable - the memory tier carries on alone.
pub struct NoopStorage;

impl DurableStorage for NoopStorage {
  fn get(&self, _partition: Partition, _key: &str) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _partition: Partition, _entry: &CacheEntry) -> Result<()> {
    Ok(()) // Discard
  }

  fn delete(&self, _partition: Partition, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self, _partition: Partition) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based durable storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    conn
      .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to enable WAL mode: {}", e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory store. Nothing survives the handle.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("appsession").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    partition TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    ttl_ms INTEGER,
    inserted_at_ms INTEGER NOT NULL,
    PRIMARY KEY (partition, key)
);
"#;

impl DurableStorage for SqliteStorage {
  fn get(&self, partition: Partition, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare_cached(
        "SELECT value, ttl_ms, inserted_at_ms FROM cache_entries
         WHERE partition = ? AND key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(String, Option<i64>, i64)> = stmt
      .query_row(params![partition.as_str(), key], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    Ok(row.map(|(value, ttl_ms, inserted_at_ms)| CacheEntry {
      key: key.to_string(),
      value,
      tier: Tier::Durable,
      ttl_ms,
      inserted_at_ms,
    }))
  }

  fn put(&self, partition: Partition, entry: &CacheEntry) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (partition, key, value, ttl_ms, inserted_at_ms)
         VALUES (?, ?, ?, ?, ?)",
        params![
          partition.as_str(),
          entry.key,
          entry.value,
          entry.ttl_ms,
          entry.inserted_at_ms
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", entry.key, e))?;

    Ok(())
  }

  fn delete(&self, partition: Partition, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE partition = ? AND key = ?",
        params![partition.as_str(), key],
      )
      .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key, e))?;

    Ok(())
  }

  fn clear(&self, partition: Partition) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE partition = ?",
        params![partition.as_str()],
      )
      .map_err(|e| eyre!("Failed to clear {} partition: {}", partition.as_str(), e))?;

    Ok(())
  }

  fn flush(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // No-op (returns a row of -1s) for in-memory databases
    conn
      .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
      .map_err(|e| eyre!("Failed to checkpoint cache database: {}", e))?;

    Ok(())
  }
}
