use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::Redirects;
use crate::cache::SqliteStorage;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub identity: IdentityConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub redirects: Redirects,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
  /// Base URL of the identity provider (e.g., "https://abc.supabase.co")
  pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Durable cache database (default: $XDG_DATA_HOME/appsession/cache.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./appsession.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/appsession/config.yaml
  ///
  /// Without a file, built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("appsession.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("appsession").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Durable cache location, falling back to the data directory.
  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(p) => Ok(p.clone()),
      None => SqliteStorage::default_path(),
    }
  }

  /// Identity provider base URL, required for completing callbacks.
  pub fn identity_url(&self) -> Result<&str> {
    self.identity.url.as_deref().ok_or_else(|| {
      eyre!("Identity provider URL not configured. Set identity.url in the config file.")
    })
  }

  /// Get the identity provider's public API key from environment variables.
  ///
  /// Checks APPSESSION_ANON_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("APPSESSION_ANON_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!(
          "Identity provider API key not found. Set APPSESSION_ANON_KEY or SUPABASE_ANON_KEY environment variable."
        )
      })
  }
}
