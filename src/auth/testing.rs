//! Scriptable identity provider for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::provider::{IdentityProvider, ProviderError};
use super::types::{Session, User};

pub(crate) struct StubProvider {
  reject_with: Option<String>,
  delay: Duration,
  calls: AtomicUsize,
  tokens: Mutex<Vec<(String, String)>>,
  codes: Mutex<Vec<String>>,
}

impl StubProvider {
  pub(crate) fn accepting() -> Self {
    Self {
      reject_with: None,
      delay: Duration::ZERO,
      calls: AtomicUsize::new(0),
      tokens: Mutex::new(Vec::new()),
      codes: Mutex::new(Vec::new()),
    }
  }

  pub(crate) fn rejecting(message: &str) -> Self {
    Self {
      reject_with: Some(message.to_string()),
      ..Self::accepting()
    }
  }

  /// Sleep before answering, to hold an exchange in flight.
  pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Completed exchanges (calls that got past the delay).
  pub(crate) fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub(crate) fn seen_tokens(&self) -> Vec<(String, String)> {
    self.tokens.lock().unwrap().clone()
  }

  pub(crate) fn seen_codes(&self) -> Vec<String> {
    self.codes.lock().unwrap().clone()
  }

  async fn answer(&self, access_token: &str, refresh_token: &str) -> Result<Session, ProviderError> {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    self.calls.fetch_add(1, Ordering::SeqCst);

    match &self.reject_with {
      Some(message) => Err(ProviderError::Rejected(message.clone())),
      None => Ok(Session {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        token_type: "bearer".to_string(),
        expires_at: None,
        user: User {
          id: "user-1".to_string(),
          email: Some("ada@example.test".to_string()),
        },
      }),
    }
  }
}

#[async_trait]
impl IdentityProvider for StubProvider {
  async fn exchange(
    &self,
    access_token: &str,
    refresh_token: &str,
  ) -> Result<Session, ProviderError> {
    self
      .tokens
      .lock()
      .unwrap()
      .push((access_token.to_string(), refresh_token.to_string()));
    self.answer(access_token, refresh_token).await
  }

  async fn exchange_code(&self, code: &str) -> Result<Session, ProviderError> {
    self.codes.lock().unwrap().push(code.to_string());
    self.answer("code-access", "code-refresh").await
  }
}
