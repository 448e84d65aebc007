//! Identity provider client contract and its HTTP implementation.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::types::{Session, User};

/// Identity provider error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
  /// The provider answered and said no
  #[error("{0}")]
  Rejected(String),

  #[error("Identity provider unreachable: {0}")]
  Transport(String),

  #[error("Unexpected identity provider response: {0}")]
  InvalidResponse(String),
}

/// Exchanges callback credentials for an established session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
  /// Validate a token pair delivered directly in the link.
  async fn exchange(&self, access_token: &str, refresh_token: &str)
    -> Result<Session, ProviderError>;

  /// Redeem a one-time code delivered instead of tokens.
  async fn exchange_code(&self, code: &str) -> Result<Session, ProviderError>;
}

/// Client for a GoTrue-compatible auth API.
#[derive(Clone)]
pub struct HttpIdentityProvider {
  client: reqwest::Client,
  base_url: Url,
  api_key: String,
  code_verifier: Option<String>,
}

impl HttpIdentityProvider {
  pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
    // Url::join drops the last path segment unless it ends in '/'
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base_url = Url::parse(&normalized)
      .map_err(|e| eyre!("Invalid identity provider URL {}: {}", base_url, e))?;

    let client = reqwest::Client::builder()
      .user_agent(concat!("appsession/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      api_key: api_key.into(),
      code_verifier: None,
    })
  }

  /// PKCE verifier generated when the sign-in was started.
  pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
    self.code_verifier = Some(verifier.into());
    self
  }

  fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
    self
      .base_url
      .join(path)
      .map_err(|e| ProviderError::InvalidResponse(format!("bad endpoint {}: {}", path, e)))
  }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
  async fn exchange(
    &self,
    access_token: &str,
    refresh_token: &str,
  ) -> Result<Session, ProviderError> {
    let response = self
      .client
      .get(self.endpoint("auth/v1/user")?)
      .header("apikey", &self.api_key)
      .bearer_auth(access_token)
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let user: User = read_json(response).await?;

    Ok(Session {
      access_token: access_token.to_string(),
      refresh_token: refresh_token.to_string(),
      token_type: "bearer".to_string(),
      expires_at: None,
      user,
    })
  }

  async fn exchange_code(&self, code: &str) -> Result<Session, ProviderError> {
    let mut url = self.endpoint("auth/v1/token")?;
    url.query_pairs_mut().append_pair("grant_type", "pkce");

    let body = serde_json::json!({
      "auth_code": code,
      "code_verifier": self.code_verifier,
    });

    let response = self
      .client
      .post(url)
      .header("apikey", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    read_json(response).await
  }
}

/// Error body shapes returned by GoTrue.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
  msg: Option<String>,
  message: Option<String>,
  error_description: Option<String>,
  error: Option<String>,
}

impl ApiErrorBody {
  fn into_message(self, status: StatusCode) -> String {
    self
      .error_description
      .or(self.msg)
      .or(self.message)
      .or(self.error)
      .unwrap_or_else(|| format!("HTTP {}", status))
  }
}

async fn read_json<T: serde::de::DeserializeOwned>(
  response: reqwest::Response,
) -> Result<T, ProviderError> {
  let status = response.status();
  let bytes = response
    .bytes()
    .await
    .map_err(|e| ProviderError::Transport(e.to_string()))?;

  if !status.is_success() {
    let body: ApiErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
    return Err(ProviderError::Rejected(body.into_message(status)));
  }

  serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}
