//! Local two-tier cache for session, profile and offline-queue data.
//!
//! This module provides:
//! - A memory tier that is authoritative for the process lifetime
//! - A SQLite durable tier that survives restarts, read through on first access
//! - Lazy TTL expiry evaluated at read time
//! - An ordinary and a secure (credentials) partition, clearable independently

mod engine;
mod entry;
mod error;
pub mod keys;
mod queue;
mod storage;
mod traits;

pub use engine::CacheEngine;
pub use entry::{CacheEntry, Partition, Tier};
pub use error::CacheError;
pub use queue::{OfflineQueue, QueuedAction};
pub use storage::{DurableStorage, NoopStorage, SqliteStorage};
pub use traits::StoreKey;
