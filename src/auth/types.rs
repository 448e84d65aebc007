use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Tokens carried by a callback link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
  pub access_token: Option<String>,
  pub refresh_token: Option<String>,
}

impl SessionTokens {
  pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
    Self {
      access_token: Some(access_token.into()),
      refresh_token: Some(refresh_token.into()),
    }
  }

  /// Both tokens, if both are present.
  pub fn pair(&self) -> Option<(&str, &str)> {
    match (&self.access_token, &self.refresh_token) {
      (Some(access), Some(refresh)) => Some((access, refresh)),
      _ => None,
    }
  }
}

/// Kind of email verification a callback completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
  Signup,
  Recovery,
  Invite,
  Magiclink,
  EmailChange,
}

impl VerificationType {
  pub const ALL: [VerificationType; 5] = [
    VerificationType::Signup,
    VerificationType::Recovery,
    VerificationType::Invite,
    VerificationType::Magiclink,
    VerificationType::EmailChange,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      VerificationType::Signup => "signup",
      VerificationType::Recovery => "recovery",
      VerificationType::Invite => "invite",
      VerificationType::Magiclink => "magiclink",
      VerificationType::EmailChange => "email_change",
    }
  }
}

impl FromStr for VerificationType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|v| v.as_str() == s)
      .ok_or_else(|| s.to_string())
  }
}

impl fmt::Display for VerificationType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Authenticated user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

/// Established session returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  #[serde(default = "default_token_type")]
  pub token_type: String,
  /// Epoch seconds
  #[serde(default)]
  pub expires_at: Option<i64>,
  pub user: User,
}

fn default_token_type() -> String {
  "bearer".to_string()
}

impl Session {
  pub fn is_expired(&self) -> bool {
    self
      .expires_at
      .map(|at| at <= Utc::now().timestamp())
      .unwrap_or(false)
  }
}

/// Short, non-reversible token fingerprint for logs.
pub fn fingerprint(token: &str) -> String {
  let digest = Sha256::digest(token.as_bytes());
  hex::encode(&digest[..6])
}
