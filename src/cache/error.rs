use thiserror::Error;

/// Cache engine error types
#[derive(Error, Debug)]
pub enum CacheError {
  /// The value could not be encoded for storage (a caller bug, not a storage fault)
  #[error("Failed to encode value for {key}: {source}")]
  Encode {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  /// A durable-tier write failed. Logged by the engine, never returned to callers.
  #[error("Durable write failed for {key}: {reason}")]
  StorageWriteFailed { key: String, reason: String },

  /// The durable tier could not be opened at all
  #[error("Durable storage unavailable: {0}")]
  StorageUnavailable(String),
}
