//! Offline action queue persisted through the cache engine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::CacheEngine;
use super::entry::now_ms;
use super::error::CacheError;
use super::keys::{OfflineQueueKey, OfflineQueueSeqKey};

/// An action recorded while offline, replayed once connectivity returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
  /// Strictly increasing, never reused after a drain
  pub id: u64,
  /// Action name (e.g., "profile.update")
  pub kind: String,
  pub payload: serde_json::Value,
  pub queued_at_ms: i64,
}

/// FIFO queue of offline actions stored under a single cache key.
///
/// Every handle over the same engine shares one lock, so concurrent
/// enqueues and drains never lose an action.
#[derive(Clone)]
pub struct OfflineQueue {
  cache: CacheEngine,
}

impl OfflineQueue {
  pub fn new(cache: CacheEngine) -> Self {
    Self { cache }
  }

  /// Append an action and return its id.
  pub async fn enqueue(
    &self,
    kind: &str,
    payload: serde_json::Value,
  ) -> Result<u64, CacheError> {
    let _guard = self.cache.lock_queue().await;

    let mut actions = self.pending().await;
    let last_id = self
      .cache
      .load::<OfflineQueueSeqKey>()
      .await
      .unwrap_or(0)
      .max(actions.last().map_or(0, |a| a.id));
    let id = last_id + 1;

    actions.push(QueuedAction {
      id,
      kind: kind.to_string(),
      payload,
      queued_at_ms: now_ms(),
    });
    self.cache.store::<OfflineQueueKey>(&actions, None).await?;
    self.cache.store::<OfflineQueueSeqKey>(&id, None).await?;

    debug!(id, kind, queued = actions.len(), "offline action queued");
    Ok(id)
  }

  /// All queued actions, oldest first.
  pub async fn pending(&self) -> Vec<QueuedAction> {
    self
      .cache
      .load::<OfflineQueueKey>()
      .await
      .unwrap_or_default()
  }

  pub async fn len(&self) -> usize {
    self.pending().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.pending().await.is_empty()
  }

  /// Remove and return every queued action.
  pub async fn drain(&self) -> Vec<QueuedAction> {
    let _guard = self.cache.lock_queue().await;

    let actions = self.pending().await;
    if !actions.is_empty() {
      self.cache.evict::<OfflineQueueKey>().await;
      debug!(drained = actions.len(), "offline queue drained");
    }
    actions
  }
}
