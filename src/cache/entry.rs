//! Cache entries and the tiers/partitions they live in.

use chrono::Utc;
use std::time::Duration;

/// Which tier served an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  /// Process-local map, lost on restart
  Memory,
  /// SQLite-backed store that survives restarts
  Durable,
}

/// Logical partition of the durable store.
///
/// Credentials live in `Secure` so they can be wiped without touching
/// ordinary app preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
  Ordinary,
  Secure,
}

impl Partition {
  pub fn as_str(&self) -> &'static str {
    match self {
      Partition::Ordinary => "ordinary",
      Partition::Secure => "secure",
    }
  }
}

/// A single cached value with its expiry metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub key: String,
  /// Encoded value (JSON text)
  pub value: String,
  pub tier: Tier,
  /// Time to live in milliseconds; `None` never expires
  pub ttl_ms: Option<i64>,
  pub inserted_at_ms: i64,
}

impl CacheEntry {
  /// Create a memory-tier entry stamped with the current time.
  pub fn new(key: impl Into<String>, value: String, ttl: Option<Duration>) -> Self {
    Self {
      key: key.into(),
      value,
      tier: Tier::Memory,
      ttl_ms: ttl.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
      inserted_at_ms: now_ms(),
    }
  }

  /// Whether the entry has outlived its TTL at `now_ms`.
  pub fn is_expired_at(&self, now_ms: i64) -> bool {
    match self.ttl_ms {
      Some(ttl) => self.inserted_at_ms.saturating_add(ttl) < now_ms,
      None => false,
    }
  }

  /// Same entry, relabelled with the tier it now lives in.
  pub fn in_tier(mut self, tier: Tier) -> Self {
    self.tier = tier;
    self
  }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
