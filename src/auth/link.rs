//! Extraction of session tokens and verification metadata from callback links.
//!
//! Identity providers deliver the callback either as ordinary query
//! parameters or in the URL fragment (when tokens are returned directly
//! instead of an exchange code). Both forms are accepted; query parameters
//! win when both are present.
//!
//! ```text
//! app://callback?access_token=<t>&refresh_token=<t>&type=signup
//! app://callback#access_token=<t>&refresh_token=<t>&type=signup
//! ```
//!
//! Everything here is pure: no I/O and no shared state.

use url::{form_urlencoded, Url};

use super::types::{SessionTokens, VerificationType};

/// Parameters a router has already pulled out of the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkParams {
  pub access_token: Option<String>,
  pub refresh_token: Option<String>,
  pub verification_type: Option<String>,
  pub code: Option<String>,
}

impl LinkParams {
  /// Fill the explicit parameters from the query string of `raw_url`,
  /// the way a deep-link router does before handing the URL on.
  pub fn from_url(raw_url: &str) -> Self {
    let query = query_of(raw_url);
    let query = query.as_deref();
    Self {
      access_token: lookup(query, "access_token"),
      refresh_token: lookup(query, "refresh_token"),
      verification_type: lookup(query, "type"),
      code: lookup(query, "code"),
    }
  }
}

/// A callback URL together with its router-extracted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackLink {
  pub raw_url: String,
  pub params: LinkParams,
}

impl CallbackLink {
  pub fn new(raw_url: impl Into<String>, params: LinkParams) -> Self {
    Self {
      raw_url: raw_url.into(),
      params,
    }
  }

  /// Build from a raw URL alone, taking explicit parameters from its query.
  pub fn from_url(raw_url: impl Into<String>) -> Self {
    let raw_url = raw_url.into();
    let params = LinkParams::from_url(&raw_url);
    Self { raw_url, params }
  }
}

/// Extract the session tokens.
///
/// Order: both explicit parameters, then both tokens from the URL query,
/// then whatever the fragment carries. Empty strings count as absent.
pub fn extract_session_tokens(
  access_token: Option<&str>,
  refresh_token: Option<&str>,
  raw_url: &str,
) -> SessionTokens {
  if let (Some(access), Some(refresh)) = (non_empty(access_token), non_empty(refresh_token)) {
    return SessionTokens::new(access, refresh);
  }

  let query = query_of(raw_url);
  let query = query.as_deref();
  if let (Some(access), Some(refresh)) = (
    lookup(query, "access_token"),
    lookup(query, "refresh_token"),
  ) {
    return SessionTokens::new(access, refresh);
  }

  match fragment_of(raw_url) {
    Some(fragment) => SessionTokens {
      access_token: lookup(Some(&fragment), "access_token"),
      refresh_token: lookup(Some(&fragment), "refresh_token"),
    },
    None => SessionTokens::default(),
  }
}

/// Extract the verification type: explicit parameter, then query, then fragment.
///
/// The value is returned as-is; validate it with [`is_verification_type`].
pub fn extract_verification_type(type_param: Option<&str>, raw_url: &str) -> Option<String> {
  first_of(type_param, raw_url, "type")
}

/// Extract a one-time exchange code: explicit parameter, then query, then fragment.
pub fn extract_exchange_code(code_param: Option<&str>, raw_url: &str) -> Option<String> {
  first_of(code_param, raw_url, "code")
}

/// Extract a failure reported by the provider in the link itself.
///
/// Prefers `error_description` over the bare `error` code.
pub fn extract_provider_error(raw_url: &str) -> Option<String> {
  let query = query_of(raw_url);
  let fragment = fragment_of(raw_url);
  let (query, fragment) = (query.as_deref(), fragment.as_deref());

  lookup(query, "error_description")
    .or_else(|| lookup(fragment, "error_description"))
    .or_else(|| lookup(query, "error"))
    .or_else(|| lookup(fragment, "error"))
}

/// Membership test against the closed verification-type set.
pub fn is_verification_type(value: &str) -> bool {
  value.parse::<VerificationType>().is_ok()
}

fn first_of(explicit: Option<&str>, raw_url: &str, name: &str) -> Option<String> {
  non_empty(explicit)
    .map(String::from)
    .or_else(|| lookup(query_of(raw_url).as_deref(), name))
    .or_else(|| lookup(fragment_of(raw_url).as_deref(), name))
}

/// The query component, excluding any fragment.
///
/// Links that don't parse as absolute URLs (bare paths from a router) are
/// split by hand.
fn query_of(raw_url: &str) -> Option<String> {
  match Url::parse(raw_url) {
    Ok(url) => url.query().map(String::from),
    Err(_) => {
      let before_fragment = raw_url.split_once('#').map_or(raw_url, |(head, _)| head);
      before_fragment.split_once('?').map(|(_, query)| query.to_string())
    }
  }
}

fn fragment_of(raw_url: &str) -> Option<String> {
  match Url::parse(raw_url) {
    Ok(url) => url.fragment().map(String::from),
    Err(_) => raw_url.split_once('#').map(|(_, fragment)| fragment.to_string()),
  }
}

/// First non-empty value for `name` in a form-encoded section.
fn lookup(section: Option<&str>, name: &str) -> Option<String> {
  form_urlencoded::parse(section?.as_bytes())
    .find(|(k, v)| k == name && !v.is_empty())
    .map(|(_, v)| v.into_owned())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
  value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  const QUERY_URL: &str = "app://callback?access_token=abc&refresh_token=def&type=signup";
  const FRAGMENT_URL: &str = "app://callback#access_token=abc&refresh_token=def&type=signup";

  #[test]
  fn test_explicit_tokens_win() {
    let tokens = extract_session_tokens(Some("x"), Some("y"), FRAGMENT_URL);
    assert_eq!(tokens, SessionTokens::new("x", "y"));
  }

  #[test]
  fn test_fragment_tokens() {
    let tokens = extract_session_tokens(None, None, FRAGMENT_URL);
    assert_eq!(tokens, SessionTokens::new("abc", "def"));
  }

  #[test]
  fn test_query_and_fragment_forms_are_equivalent() {
    let via_params = {
      let params = LinkParams::from_url(QUERY_URL);
      extract_session_tokens(
        params.access_token.as_deref(),
        params.refresh_token.as_deref(),
        QUERY_URL,
      )
    };
    let via_raw_query = extract_session_tokens(None, None, QUERY_URL);
    let via_fragment = extract_session_tokens(None, None, FRAGMENT_URL);

    assert_eq!(via_params, via_fragment);
    assert_eq!(via_raw_query, via_fragment);
  }

  #[test]
  fn test_query_takes_priority_over_fragment() {
    let url = "app://callback?access_token=q1&refresh_token=q2#access_token=f1&refresh_token=f2";
    assert_eq!(
      extract_session_tokens(None, None, url),
      SessionTokens::new("q1", "q2")
    );
  }

  #[test]
  fn test_one_explicit_token_falls_back_to_fragment() {
    let tokens = extract_session_tokens(Some("x"), None, FRAGMENT_URL);
    assert_eq!(tokens, SessionTokens::new("abc", "def"));

    let tokens = extract_session_tokens(Some(""), Some("y"), FRAGMENT_URL);
    assert_eq!(tokens, SessionTokens::new("abc", "def"));
  }

  #[test]
  fn test_no_tokens_anywhere() {
    assert_eq!(
      extract_session_tokens(None, None, "app://callback?type=signup"),
      SessionTokens::default()
    );
    assert_eq!(
      extract_session_tokens(None, None, "app://callback#type=signup"),
      SessionTokens::default()
    );
  }

  #[test]
  fn test_partial_fragment() {
    let tokens = extract_session_tokens(None, None, "app://callback#access_token=abc");
    assert_eq!(tokens.access_token.as_deref(), Some("abc"));
    assert_eq!(tokens.refresh_token, None);
    assert!(tokens.pair().is_none());
  }

  #[test]
  fn test_tokens_are_form_decoded() {
    let tokens =
      extract_session_tokens(None, None, "app://callback#access_token=a%2Bb&refresh_token=c+d");
    assert_eq!(tokens, SessionTokens::new("a+b", "c d"));
  }

  #[test]
  fn test_explicit_type_wins() {
    assert_eq!(
      extract_verification_type(Some("recovery"), FRAGMENT_URL).as_deref(),
      Some("recovery")
    );
    assert_eq!(
      extract_verification_type(Some("recovery"), "").as_deref(),
      Some("recovery")
    );
  }

  #[test]
  fn test_type_query_over_fragment() {
    let url = "app://callback?type=invite#type=magiclink";
    assert_eq!(extract_verification_type(None, url).as_deref(), Some("invite"));
    assert_eq!(
      extract_verification_type(None, "app://callback#type=magiclink").as_deref(),
      Some("magiclink")
    );
    assert_eq!(extract_verification_type(None, "app://callback"), None);
  }

  #[test]
  fn test_fragment_is_not_read_as_query() {
    // A '?' inside the fragment belongs to the fragment
    let url = "app://callback#next?type=recovery";
    assert_eq!(query_of(url), None);
    assert_eq!(fragment_of(url).as_deref(), Some("next?type=recovery"));
  }

  #[test]
  fn test_relative_link_falls_back_to_split() {
    let url = "/callback?type=invite#access_token=abc&refresh_token=def";
    assert_eq!(query_of(url).as_deref(), Some("type=invite"));
    assert_eq!(extract_verification_type(None, url).as_deref(), Some("invite"));

    let tokens = extract_session_tokens(None, None, url);
    assert_eq!(tokens.pair(), Some(("abc", "def")));
  }

  #[test]
  fn test_is_verification_type() {
    for v in ["signup", "recovery", "invite", "magiclink", "email_change"] {
      assert!(is_verification_type(v), "{} should be accepted", v);
    }
    assert!(!is_verification_type("bogus"));
    assert!(!is_verification_type(""));
  }

  #[test]
  fn test_exchange_code() {
    assert_eq!(
      extract_exchange_code(None, "app://callback?code=xyz").as_deref(),
      Some("xyz")
    );
    assert_eq!(
      extract_exchange_code(None, "app://callback#code=frag").as_deref(),
      Some("frag")
    );
    assert_eq!(
      extract_exchange_code(Some("explicit"), "app://callback?code=xyz").as_deref(),
      Some("explicit")
    );
  }

  #[test]
  fn test_provider_error() {
    let url = "app://callback#error=access_denied&error_description=Email+link+is+invalid+or+has+expired";
    assert_eq!(
      extract_provider_error(url).as_deref(),
      Some("Email link is invalid or has expired")
    );
    assert_eq!(
      extract_provider_error("app://callback?error=server_error").as_deref(),
      Some("server_error")
    );
    assert_eq!(extract_provider_error(FRAGMENT_URL), None);
  }

  #[test]
  fn test_link_params_from_url() {
    let params = LinkParams::from_url(QUERY_URL);
    assert_eq!(params.access_token.as_deref(), Some("abc"));
    assert_eq!(params.refresh_token.as_deref(), Some("def"));
    assert_eq!(params.verification_type.as_deref(), Some("signup"));
    assert_eq!(params.code, None);

    // Fragment values are not router parameters
    assert_eq!(LinkParams::from_url(FRAGMENT_URL), LinkParams::default());
  }
}
