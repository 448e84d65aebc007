use thiserror::Error;

/// Ways a callback can fail to produce a session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
  /// Neither tokens nor an exchange code were found in the link
  #[error("Callback link carries no session tokens or exchange code")]
  MissingTokens,

  #[error("Unknown verification type: {0}")]
  UnknownVerificationType(String),

  /// The identity provider rejected or could not validate the credentials
  #[error("Session exchange failed: {0}")]
  ExchangeFailed(String),
}

impl BootstrapError {
  /// Message suitable for showing to the user.
  pub fn user_message(&self) -> String {
    match self {
      BootstrapError::MissingTokens => {
        "This link is missing its sign-in details. Please request a new link.".to_string()
      }
      BootstrapError::UnknownVerificationType(_) => {
        "This link type isn't supported. Please request a new link.".to_string()
      }
      BootstrapError::ExchangeFailed(reason) => format!("We couldn't verify your link: {}", reason),
    }
  }
}
