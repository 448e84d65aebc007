//! Callback state machine driving a session bootstrap for the UI.
//!
//! A controller is created with the callback link it should complete and
//! immediately starts the bootstrap in the background. It moves from
//! `Loading` to exactly one terminal state and never back.
//!
//! # Example
//!
//! ```ignore
//! let mut controller = CallbackController::start(bootstrap, redirects, link);
//!
//! // In event loop tick
//! if controller.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! match controller.status() {
//!     CallbackStatus::Loading => render_spinner(),
//!     CallbackStatus::Success { message } => redirect(controller.redirect_target()),
//!     CallbackStatus::Error { message, .. } => offer_retry(controller.retry_target()),
//! }
//! ```

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::bootstrap::{BootstrapOutcome, SessionBootstrap};
use super::error::BootstrapError;
use super::link::CallbackLink;
use super::types::VerificationType;

/// Confirmation shown once the session is established.
pub const SUCCESS_MESSAGE: &str = "You're all set. Your account has been verified.";

/// Status exposed to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
  Loading,
  Success { message: String },
  Error { message: String, error: BootstrapError },
}

impl CallbackStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, CallbackStatus::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, CallbackStatus::Success { .. })
  }

  pub fn is_error(&self) -> bool {
    matches!(self, CallbackStatus::Error { .. })
  }

  pub fn message(&self) -> Option<&str> {
    match self {
      CallbackStatus::Loading => None,
      CallbackStatus::Success { message } | CallbackStatus::Error { message, .. } => Some(message),
    }
  }

  pub fn error(&self) -> Option<&BootstrapError> {
    match self {
      CallbackStatus::Error { error, .. } => Some(error),
      _ => None,
    }
  }
}

/// Route targets handed to the UI after a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Redirects {
  /// Where to go once signed in
  pub sign_in_complete: String,
  /// "Back to sign in" after a failure
  pub sign_in: String,
  /// Where a completed recovery link lands
  pub password_reset: String,
}

impl Default for Redirects {
  fn default() -> Self {
    Self {
      sign_in_complete: "/".to_string(),
      sign_in: "/sign-in".to_string(),
      password_reset: "/reset-password".to_string(),
    }
  }
}

type BootstrapResult = Result<BootstrapOutcome, BootstrapError>;

/// Drives one callback from `Loading` to a terminal state.
///
/// Dropping the controller cancels an in-flight exchange and discards its
/// result.
pub struct CallbackController {
  status: CallbackStatus,
  redirects: Redirects,
  redirect: Option<String>,
  receiver: Option<oneshot::Receiver<BootstrapResult>>,
  task: Option<JoinHandle<()>>,
}

impl CallbackController {
  /// Create the controller in `Loading` and start completing `link`.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(
    bootstrap: Arc<SessionBootstrap>,
    redirects: Redirects,
    link: CallbackLink,
  ) -> Self {
    let (tx, rx) = oneshot::channel();

    let task = tokio::spawn(async move {
      let result = bootstrap.complete(&link).await;
      // Ignore send errors - controller may have been disposed
      let _ = tx.send(result);
    });

    Self {
      status: CallbackStatus::Loading,
      redirects,
      redirect: None,
      receiver: Some(rx),
      task: Some(task),
    }
  }

  /// Offer another callback link. Always ignored: the first link wins, so
  /// two exchanges never race against the provider.
  pub fn offer(&mut self, link: &CallbackLink) -> bool {
    debug!(
      loading = self.status.is_loading(),
      url_len = link.raw_url.len(),
      "ignoring additional callback link"
    );
    false
  }

  pub fn status(&self) -> &CallbackStatus {
    &self.status
  }

  pub fn message(&self) -> Option<&str> {
    self.status.message()
  }

  pub fn is_loading(&self) -> bool {
    self.status.is_loading()
  }

  /// Destination to navigate to, once the callback succeeded.
  pub fn redirect_target(&self) -> Option<&str> {
    self.redirect.as_deref()
  }

  /// "Back to sign in" destination, once the callback failed.
  pub fn retry_target(&self) -> Option<&str> {
    match self.status {
      CallbackStatus::Error { .. } => Some(&self.redirects.sign_in),
      _ => None,
    }
  }

  /// Apply a finished result without blocking.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(result) => {
        self.finish(Some(result));
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => false,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.finish(None);
        true
      }
    }
  }

  /// Wait for the terminal state.
  pub async fn settle(&mut self) -> &CallbackStatus {
    if let Some(receiver) = self.receiver.as_mut() {
      let result = receiver.await.ok();
      self.finish(result);
    }
    &self.status
  }

  /// Tear the controller down. Same as dropping it.
  pub fn dispose(self) {}

  fn finish(&mut self, result: Option<BootstrapResult>) {
    self.receiver = None;
    self.task = None;

    self.status = match result {
      Some(Ok(outcome)) => {
        let target = match outcome.verification {
          Some(VerificationType::Recovery) => &self.redirects.password_reset,
          _ => &self.redirects.sign_in_complete,
        };
        self.redirect = Some(target.clone());
        CallbackStatus::Success {
          message: SUCCESS_MESSAGE.to_string(),
        }
      }
      Some(Err(error)) => CallbackStatus::Error {
        message: error.user_message(),
        error,
      },
      // Sender dropped without sending - the task died
      None => {
        let error = BootstrapError::ExchangeFailed("sign-in was interrupted".to_string());
        CallbackStatus::Error {
          message: error.user_message(),
          error,
        }
      }
    };

    debug!(status = ?self.status, "callback settled");
  }
}

impl Drop for CallbackController {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      debug!("callback controller disposed mid-exchange; cancelling");
      task.abort();
    }
  }
}

impl std::fmt::Debug for CallbackController {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CallbackController")
      .field("status", &self.status)
      .field("redirect", &self.redirect)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::testing::StubProvider;
  use crate::cache::keys::SessionKey;
  use crate::cache::{CacheEngine, SqliteStorage};
  use std::time::Duration;

  fn setup(provider: StubProvider) -> (Arc<SessionBootstrap>, CacheEngine, Arc<StubProvider>) {
    let cache = CacheEngine::with_storage(SqliteStorage::in_memory().unwrap());
    let provider = Arc::new(provider);
    let bootstrap = Arc::new(SessionBootstrap::new(cache.clone(), provider.clone()));
    (bootstrap, cache, provider)
  }

  #[tokio::test]
  async fn test_success_flow() {
    let (bootstrap, cache, _) = setup(StubProvider::accepting());
    let link =
      CallbackLink::from_url("app://callback#access_token=abc&refresh_token=def&type=signup");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), link);
    assert!(controller.is_loading());
    assert_eq!(controller.redirect_target(), None);

    let status = controller.settle().await.clone();

    assert!(status.is_success());
    assert_eq!(status.message(), Some(SUCCESS_MESSAGE));
    assert_eq!(controller.redirect_target(), Some("/"));
    assert_eq!(controller.retry_target(), None);
    assert!(cache.load::<SessionKey>().await.is_some());
  }

  #[tokio::test]
  async fn test_unknown_type_ends_in_error() {
    let (bootstrap, _, _) = setup(StubProvider::accepting());
    let link = CallbackLink::from_url("app://callback?type=unknown");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), link);
    let status = controller.settle().await;

    assert_eq!(
      status.error(),
      Some(&BootstrapError::UnknownVerificationType("unknown".to_string()))
    );
    assert_eq!(controller.redirect_target(), None);
    assert_eq!(controller.retry_target(), Some("/sign-in"));
  }

  #[tokio::test]
  async fn test_exchange_failure_message_carries_reason() {
    let (bootstrap, _, _) = setup(StubProvider::rejecting("Invalid JWT"));
    let link = CallbackLink::from_url("app://callback#access_token=abc&refresh_token=def");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), link);
    let status = controller.settle().await;

    assert!(status.is_error());
    assert!(status.message().unwrap().contains("Invalid JWT"));
  }

  #[tokio::test]
  async fn test_recovery_redirects_to_password_reset() {
    let (bootstrap, _, _) = setup(StubProvider::accepting());
    let link = CallbackLink::from_url(
      "app://callback#access_token=abc&refresh_token=def&type=recovery",
    );
    let redirects = Redirects {
      password_reset: "/account/password".to_string(),
      ..Redirects::default()
    };

    let mut controller = CallbackController::start(bootstrap, redirects, link);
    controller.settle().await;

    assert_eq!(controller.redirect_target(), Some("/account/password"));
  }

  #[tokio::test]
  async fn test_poll_applies_result_once() {
    let (bootstrap, _, _) = setup(StubProvider::accepting());
    let link = CallbackLink::from_url("app://callback#access_token=abc&refresh_token=def");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), link);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(controller.poll());
    assert!(controller.status().is_success());
    // Terminal: nothing left to apply
    assert!(!controller.poll());
    assert!(controller.status().is_success());
  }

  #[tokio::test]
  async fn test_poll_while_loading_is_noop() {
    let (bootstrap, _, _) =
      setup(StubProvider::accepting().with_delay(Duration::from_millis(100)));
    let link = CallbackLink::from_url("app://callback#access_token=abc&refresh_token=def");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), link);

    assert!(!controller.poll());
    assert!(controller.is_loading());
  }

  #[tokio::test]
  async fn test_second_link_is_ignored() {
    let (bootstrap, _, provider) =
      setup(StubProvider::accepting().with_delay(Duration::from_millis(50)));
    let first = CallbackLink::from_url("app://callback#access_token=a1&refresh_token=r1");
    let second = CallbackLink::from_url("app://callback#access_token=a2&refresh_token=r2");

    let mut controller = CallbackController::start(bootstrap, Redirects::default(), first);
    assert!(!controller.offer(&second));
    controller.settle().await;
    assert!(!controller.offer(&second));

    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.seen_tokens(), vec![("a1".to_string(), "r1".to_string())]);
  }

  #[tokio::test]
  async fn test_dispose_cancels_in_flight_exchange() {
    let (bootstrap, cache, provider) =
      setup(StubProvider::accepting().with_delay(Duration::from_millis(100)));
    let link = CallbackLink::from_url("app://callback#access_token=abc&refresh_token=def");

    let controller = CallbackController::start(bootstrap, Redirects::default(), link);
    tokio::time::sleep(Duration::from_millis(10)).await;
    controller.dispose();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(provider.calls(), 0);
    assert!(cache.load::<SessionKey>().await.is_none());
  }
}
