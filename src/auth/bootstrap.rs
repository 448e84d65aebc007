//! Turns a callback link into an established, persisted session.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cache::keys::SessionKey;
use crate::cache::CacheEngine;

use super::error::BootstrapError;
use super::link::{
  extract_exchange_code, extract_provider_error, extract_session_tokens,
  extract_verification_type, CallbackLink,
};
use super::provider::IdentityProvider;
use super::types::{fingerprint, Session, VerificationType};

/// How the session was obtained from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMethod {
  Tokens,
  Code,
}

/// Result of a completed bootstrap. The session itself now lives in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
  pub verification: Option<VerificationType>,
  pub user_id: String,
  pub method: ExchangeMethod,
}

/// Orchestrates parse, validate, exchange and persist for one callback.
pub struct SessionBootstrap {
  cache: CacheEngine,
  provider: Arc<dyn IdentityProvider>,
}

impl SessionBootstrap {
  pub fn new(cache: CacheEngine, provider: Arc<dyn IdentityProvider>) -> Self {
    Self { cache, provider }
  }

  /// Complete the sign-in (or sign-up, or recovery) a callback link carries.
  ///
  /// The session is written to the secure partition only after the provider
  /// has accepted the credentials; any failure leaves the cache untouched.
  pub async fn complete(&self, link: &CallbackLink) -> Result<BootstrapOutcome, BootstrapError> {
    let params = &link.params;
    let raw_url = link.raw_url.as_str();

    // 1. Parse
    let tokens = extract_session_tokens(
      params.access_token.as_deref(),
      params.refresh_token.as_deref(),
      raw_url,
    );
    let verification_type = extract_verification_type(params.verification_type.as_deref(), raw_url);

    // 2. Validate
    let verification = match verification_type {
      Some(value) => Some(
        value
          .parse::<VerificationType>()
          .map_err(BootstrapError::UnknownVerificationType)?,
      ),
      None => None,
    };

    if let Some(reason) = extract_provider_error(raw_url) {
      warn!(%reason, "provider reported an error in the callback link");
      return Err(BootstrapError::ExchangeFailed(reason));
    }

    // 3-4. Exchange
    let (session, method) = match tokens.pair() {
      Some((access, refresh)) => {
        debug!(access = %fingerprint(access), "exchanging callback tokens");
        let session = self
          .provider
          .exchange(access, refresh)
          .await
          .map_err(|e| BootstrapError::ExchangeFailed(e.to_string()))?;
        (session, ExchangeMethod::Tokens)
      }
      None => {
        let code = extract_exchange_code(params.code.as_deref(), raw_url)
          .ok_or(BootstrapError::MissingTokens)?;
        debug!(code = %fingerprint(&code), "exchanging callback code");
        let session = self
          .provider
          .exchange_code(&code)
          .await
          .map_err(|e| BootstrapError::ExchangeFailed(e.to_string()))?;
        (session, ExchangeMethod::Code)
      }
    };

    // 5. Persist
    let outcome = BootstrapOutcome {
      verification,
      user_id: session.user.id.clone(),
      method,
    };
    self.persist(session).await?;

    info!(
      user = %outcome.user_id,
      verification = ?outcome.verification.map(|v| v.as_str()),
      method = ?outcome.method,
      "session established"
    );
    Ok(outcome)
  }

  async fn persist(&self, session: Session) -> Result<(), BootstrapError> {
    // No TTL: sessions end by sign-out, not by time
    self
      .cache
      .store::<SessionKey>(&session, None)
      .await
      .map_err(|e| {
        error!(error = %e, "failed to store session");
        BootstrapError::ExchangeFailed("the session could not be stored".to_string())
      })
  }
}
