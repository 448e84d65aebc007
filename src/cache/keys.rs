//! Logical keys stored by the app shell and the snapshot types behind them.

use serde::{Deserialize, Serialize};

use crate::auth::Session;

use super::entry::Partition;
use super::queue::QueuedAction;
use super::traits::StoreKey;

// ============================================================================
// Snapshot types
// ============================================================================

/// Cached copy of the signed-in user's profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
  pub id: String,
  pub email: Option<String>,
  pub display_name: Option<String>,
  pub avatar_url: Option<String>,
}

/// Cached premium entitlement, refreshed from the purchase provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
  pub is_premium: bool,
  pub product_id: Option<String>,
  /// Epoch seconds
  pub expires_at: Option<i64>,
}

// ============================================================================
// Keys
// ============================================================================

/// The established session (secure partition).
pub struct SessionKey;

impl StoreKey for SessionKey {
  type Value = Session;

  fn key() -> &'static str {
    "session"
  }

  fn partition() -> Partition {
    Partition::Secure
  }
}

pub struct ProfileSnapshotKey;

impl StoreKey for ProfileSnapshotKey {
  type Value = ProfileSnapshot;

  fn key() -> &'static str {
    "profile_snapshot"
  }
}

pub struct EntitlementSnapshotKey;

impl StoreKey for EntitlementSnapshotKey {
  type Value = EntitlementSnapshot;

  fn key() -> &'static str {
    "entitlement_snapshot"
  }
}

/// Actions recorded while offline, oldest first.
pub struct OfflineQueueKey;

impl StoreKey for OfflineQueueKey {
  type Value = Vec<QueuedAction>;

  fn key() -> &'static str {
    "offline_queue"
  }
}

/// Last id handed out by the offline queue. Outlives drains so ids never repeat.
pub struct OfflineQueueSeqKey;

impl StoreKey for OfflineQueueSeqKey {
  type Value = u64;

  fn key() -> &'static str {
    "offline_queue_seq"
  }
}

/// UI theme preference ("light", "dark", "system"). Survives sign-out.
pub struct ThemeKey;

impl StoreKey for ThemeKey {
  type Value = String;

  fn key() -> &'static str {
    "theme"
  }
}

/// BCP-47 locale preference. Survives sign-out.
pub struct LocaleKey;

impl StoreKey for LocaleKey {
  type Value = String;

  fn key() -> &'static str {
    "locale"
  }
}

/// Whether onboarding has been completed. Survives sign-out.
pub struct OnboardingCompleteKey;

impl StoreKey for OnboardingCompleteKey {
  type Value = bool;

  fn key() -> &'static str {
    "onboarding_complete"
  }
}
