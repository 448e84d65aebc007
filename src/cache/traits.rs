//! Core traits for typed cache access.

use serde::{de::DeserializeOwned, Serialize};

use super::entry::Partition;

/// A logical cache key with a fixed value type.
///
/// Implementors pin down the encode/decode contract for one slot of the
/// cache: the string key, the partition it lives in and the type stored
/// there. A stored value that no longer decodes as `Value` reads as a miss.
pub trait StoreKey {
  /// The type stored under this key.
  type Value: Serialize + DeserializeOwned + Send + Sync;

  /// Storage key (e.g., "profile_snapshot")
  fn key() -> &'static str;

  /// Partition the key lives in.
  fn partition() -> Partition {
    Partition::Ordinary
  }
}
