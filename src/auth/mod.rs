//! Authentication-completion handshake for inbound deep links.
//!
//! Flow: callback URL -> [`link`] parsing -> [`SessionBootstrap`] (validate,
//! exchange with the identity provider, persist) -> [`CallbackController`]
//! status for the UI.

mod bootstrap;
mod controller;
mod error;
pub mod link;
mod provider;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapOutcome, ExchangeMethod, SessionBootstrap};
pub use controller::{CallbackController, CallbackStatus, Redirects, SUCCESS_MESSAGE};
pub use error::BootstrapError;
pub use link::{CallbackLink, LinkParams};
pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderError};
pub use types::{fingerprint, Session, SessionTokens, User, VerificationType};
