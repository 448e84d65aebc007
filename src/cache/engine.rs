//! Two-tier cache engine: a process-local memory tier in front of a durable store.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::entry::{now_ms, CacheEntry, Partition, Tier};
use super::error::CacheError;
use super::keys::{EntitlementSnapshotKey, OfflineQueueKey, OfflineQueueSeqKey, ProfileSnapshotKey};
use super::storage::{DurableStorage, NoopStorage, SqliteStorage};
use super::traits::StoreKey;

type MemoryKey = (Partition, String);

#[derive(Default)]
struct MemoryTier {
  entries: HashMap<MemoryKey, CacheEntry>,
  /// Bumped on every write, remove and clear. A read-through only
  /// repopulates memory if nothing was written while the durable read ran.
  epoch: u64,
}

/// Key-value cache with a fast volatile tier and a durable tier.
///
/// - Reads check memory first, then fall through to the durable tier and
///   repopulate memory on a hit.
/// - Writes land in memory synchronously; the durable write is best-effort.
/// - Expiry is evaluated lazily at read time.
///
/// The engine is the sole owner of the durable store handle. Clones share
/// both tiers and the offline queue lock.
#[derive(Clone)]
pub struct CacheEngine {
  memory: Arc<Mutex<MemoryTier>>,
  storage: Arc<dyn DurableStorage>,
  /// Serializes read-modify-write of the offline queue keys
  queue_lock: Arc<AsyncMutex<()>>,
}

impl CacheEngine {
  /// Open the engine with a SQLite durable tier at `path`.
  pub fn open(path: &Path) -> Result<Self, CacheError> {
    let storage =
      SqliteStorage::open_at(path).map_err(|e| CacheError::StorageUnavailable(e.to_string()))?;
    info!(path = %path.display(), "cache opened");
    Ok(Self::with_storage(storage))
  }

  /// Create an engine over an arbitrary durable backend.
  pub fn with_storage(storage: impl DurableStorage + 'static) -> Self {
    Self {
      memory: Arc::new(Mutex::new(MemoryTier::default())),
      storage: Arc::new(storage),
      queue_lock: Arc::new(AsyncMutex::new(())),
    }
  }

  /// Create an engine whose durable tier discards everything.
  pub fn memory_only() -> Self {
    Self::with_storage(NoopStorage)
  }

  /// Flush the durable tier. The engine should not be used afterwards.
  pub async fn close(self) -> Result<()> {
    self.durable(|s| s.flush()).await?;
    debug!("cache closed");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Ordinary partition
  // --------------------------------------------------------------------------

  /// Get a value, or `None` if missing, expired or not decodable as `T`.
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self.get_in(Partition::Ordinary, key).await
  }

  /// Store a value, replacing any previous one.
  ///
  /// Only an encode failure is reported; a durable-tier failure is logged
  /// and the memory tier stays authoritative for this process.
  pub async fn set<T: Serialize + ?Sized>(
    &self,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    self.set_in(Partition::Ordinary, key, value, ttl).await
  }

  pub async fn remove(&self, key: &str) {
    self.remove_in(Partition::Ordinary, key).await
  }

  /// Clear every ordinary key (preferences included).
  pub async fn clear(&self) {
    self.clear_partition(Partition::Ordinary).await
  }

  // --------------------------------------------------------------------------
  // Secure partition
  // --------------------------------------------------------------------------

  pub async fn get_secure<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self.get_in(Partition::Secure, key).await
  }

  pub async fn set_secure<T: Serialize + ?Sized>(
    &self,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    self.set_in(Partition::Secure, key, value, ttl).await
  }

  pub async fn remove_secure(&self, key: &str) {
    self.remove_in(Partition::Secure, key).await
  }

  /// Wipe stored credentials without touching ordinary keys.
  pub async fn clear_secure(&self) {
    self.clear_partition(Partition::Secure).await
  }

  // --------------------------------------------------------------------------
  // Typed keys
  // --------------------------------------------------------------------------

  pub async fn load<K: StoreKey>(&self) -> Option<K::Value> {
    self.get_in(K::partition(), K::key()).await
  }

  pub async fn store<K: StoreKey>(
    &self,
    value: &K::Value,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    self.set_in(K::partition(), K::key(), value, ttl).await
  }

  pub async fn evict<K: StoreKey>(&self) {
    self.remove_in(K::partition(), K::key()).await
  }

  // --------------------------------------------------------------------------
  // Teardown policies
  // --------------------------------------------------------------------------

  /// Session teardown: drop credentials and per-user snapshots, keep
  /// theme, locale and onboarding state.
  pub async fn sign_out(&self) {
    self.clear_secure().await;
    let _queue = self.lock_queue().await;
    futures::future::join4(
      self.evict::<ProfileSnapshotKey>(),
      self.evict::<EntitlementSnapshotKey>(),
      self.evict::<OfflineQueueKey>(),
      self.evict::<OfflineQueueSeqKey>(),
    )
    .await;
    info!("signed out; user cache cleared");
  }

  /// Full reset: both partitions, unconditionally.
  pub async fn reset(&self) {
    futures::future::join(
      self.clear_partition(Partition::Ordinary),
      self.clear_partition(Partition::Secure),
    )
    .await;
    info!("cache reset");
  }

  // --------------------------------------------------------------------------
  // Core
  // --------------------------------------------------------------------------

  /// Look up an entry, reporting which tier served it.
  pub async fn entry(&self, partition: Partition, key: &str) -> Option<CacheEntry> {
    let now = now_ms();
    let memory_key = (partition, key.to_string());

    let epoch = {
      let mut memory = self.memory();
      match memory.entries.get(&memory_key).cloned() {
        Some(entry) if entry.is_expired_at(now) => {
          memory.entries.remove(&memory_key);
          None
        }
        Some(entry) => return Some(entry),
        None => Some(memory.epoch),
      }
    };

    let Some(epoch) = epoch else {
      debug!(key, "cache entry expired");
      self.purge_durable(partition, key).await;
      return None;
    };

    let owned_key = key.to_string();
    let loaded = match self.durable(move |s| s.get(partition, &owned_key)).await {
      Ok(loaded) => loaded?,
      Err(e) => {
        warn!(key, partition = partition.as_str(), error = %e, "durable read failed");
        return None;
      }
    };

    if loaded.is_expired_at(now) {
      debug!(key, "durable entry expired");
      self.purge_durable(partition, key).await;
      return None;
    }

    // Read-through
    {
      let mut memory = self.memory();
      if memory.epoch == epoch {
        memory
          .entries
          .insert(memory_key, loaded.clone().in_tier(Tier::Memory));
      }
    }

    Some(loaded)
  }

  async fn get_in<T: DeserializeOwned>(&self, partition: Partition, key: &str) -> Option<T> {
    let entry = self.entry(partition, key).await?;
    match serde_json::from_str(&entry.value) {
      Ok(value) => Some(value),
      Err(e) => {
        debug!(key, error = %e, "cached value did not decode; treating as miss");
        None
      }
    }
  }

  async fn set_in<T: Serialize + ?Sized>(
    &self,
    partition: Partition,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<(), CacheError> {
    let encoded = serde_json::to_string(value).map_err(|source| CacheError::Encode {
      key: key.to_string(),
      source,
    })?;
    let entry = CacheEntry::new(key, encoded, ttl);

    {
      let mut memory = self.memory();
      memory.epoch += 1;
      memory
        .entries
        .insert((partition, key.to_string()), entry.clone());
    }

    if let Err(e) = self.durable(move |s| s.put(partition, &entry)).await {
      let err = CacheError::StorageWriteFailed {
        key: key.to_string(),
        reason: e.to_string(),
      };
      warn!(partition = partition.as_str(), error = %err, "continuing with memory tier only");
    }

    Ok(())
  }

  async fn remove_in(&self, partition: Partition, key: &str) {
    {
      let mut memory = self.memory();
      memory.epoch += 1;
      memory.entries.remove(&(partition, key.to_string()));
    }
    self.purge_durable(partition, key).await;
  }

  async fn clear_partition(&self, partition: Partition) {
    {
      let mut memory = self.memory();
      memory.epoch += 1;
      memory.entries.retain(|(p, _), _| *p != partition);
    }

    if let Err(e) = self.durable(move |s| s.clear(partition)).await {
      warn!(partition = partition.as_str(), error = %e, "durable clear failed");
    }
  }

  async fn purge_durable(&self, partition: Partition, key: &str) {
    let owned_key = key.to_string();
    if let Err(e) = self.durable(move |s| s.delete(partition, &owned_key)).await {
      warn!(key, partition = partition.as_str(), error = %e, "durable delete failed");
    }
  }

  /// Run a durable-tier call on the blocking pool.
  async fn durable<T, F>(&self, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&dyn DurableStorage) -> Result<T> + Send + 'static,
  {
    let storage = Arc::clone(&self.storage);
    tokio::task::spawn_blocking(move || op(storage.as_ref()))
      .await
      .map_err(|e| eyre!("Durable storage task failed: {}", e))?
  }

  /// Exclusive access to the offline queue keys across every clone.
  pub(crate) async fn lock_queue(&self) -> tokio::sync::MutexGuard<'_, ()> {
    self.queue_lock.lock().await
  }

  fn memory(&self) -> MutexGuard<'_, MemoryTier> {
    self.memory.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
