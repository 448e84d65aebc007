use appsession::auth::{
  fingerprint, CallbackController, CallbackLink, CallbackStatus, HttpIdentityProvider,
  SessionBootstrap,
};
use appsession::cache::keys::SessionKey;
use appsession::cache::CacheEngine;
use appsession::{config, logging};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "appsession")]
#[command(about = "Inspect the local session cache and complete auth callback links")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/appsession/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Complete a sign-in/sign-up/recovery callback link
  Callback {
    /// The deep link as received (query or fragment form)
    url: String,
    /// PKCE verifier, for links that carry an exchange code
    #[arg(long)]
    code_verifier: Option<String>,
  },
  /// Read and write cache entries
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Show the stored session
  Session,
  /// Clear credentials and per-user snapshots, keeping preferences
  SignOut,
  /// Clear everything
  Reset,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  Get {
    key: String,
    #[arg(long)]
    secure: bool,
  },
  Set {
    key: String,
    /// JSON value
    value: String,
    #[arg(long)]
    ttl_secs: Option<u64>,
    #[arg(long)]
    secure: bool,
  },
  Remove {
    key: String,
    #[arg(long)]
    secure: bool,
  },
  Clear {
    /// Clear the secure partition instead of the ordinary one
    #[arg(long)]
    secure: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;
  let config = config::Config::load(args.config.as_deref())?;
  let cache = open_cache(&config)?;

  let result = run(&config, &cache, args.command).await;
  let closed = cache.close().await;
  result.and(closed)
}

async fn run(config: &config::Config, cache: &CacheEngine, command: Command) -> Result<()> {
  match command {
    Command::Callback { url, code_verifier } => {
      run_callback(config, cache.clone(), url, code_verifier).await?
    }
    Command::Cache(command) => run_cache(cache, command).await?,
    Command::Session => match cache.load::<SessionKey>().await {
      Some(session) => {
        println!("user:    {}", session.user.id);
        if let Some(email) = &session.user.email {
          println!("email:   {}", email);
        }
        println!("token:   {}…", fingerprint(&session.access_token));
        println!("expired: {}", session.is_expired());
      }
      None => println!("No session stored."),
    },
    Command::SignOut => {
      cache.sign_out().await;
      println!("Signed out.");
    }
    Command::Reset => {
      cache.reset().await;
      println!("Cache reset.");
    }
  }
  Ok(())
}

/// Open the durable cache, degrading to memory-only if it can't be opened.
fn open_cache(config: &config::Config) -> Result<CacheEngine> {
  let path = config.cache_path()?;
  match CacheEngine::open(&path) {
    Ok(cache) => Ok(cache),
    Err(e) => {
      tracing::error!(error = %e, "durable cache unavailable; using memory only");
      eprintln!("warning: {} (changes will not persist)", e);
      Ok(CacheEngine::memory_only())
    }
  }
}

async fn run_callback(
  config: &config::Config,
  cache: CacheEngine,
  url: String,
  code_verifier: Option<String>,
) -> Result<()> {
  let api_key = config::Config::get_api_key()?;
  let mut provider = HttpIdentityProvider::new(config.identity_url()?, api_key)?;
  if let Some(verifier) = code_verifier {
    provider = provider.with_code_verifier(verifier);
  }

  let bootstrap = Arc::new(SessionBootstrap::new(cache, Arc::new(provider)));
  let mut controller =
    CallbackController::start(bootstrap, config.redirects.clone(), CallbackLink::from_url(url));

  // Same loop a UI would run on its tick
  while !controller.poll() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  match controller.status() {
    CallbackStatus::Success { message } => {
      println!("{}", message);
      if let Some(target) = controller.redirect_target() {
        println!("redirect: {}", target);
      }
      Ok(())
    }
    CallbackStatus::Error { message, error } => {
      println!("{}", message);
      if let Some(target) = controller.retry_target() {
        println!("back to sign in: {}", target);
      }
      Err(eyre!("{}", error))
    }
    CallbackStatus::Loading => Err(eyre!("callback did not settle")),
  }
}

async fn run_cache(cache: &CacheEngine, command: CacheCommand) -> Result<()> {
  match command {
    CacheCommand::Get { key, secure } => {
      let value = if secure {
        cache.get_secure::<serde_json::Value>(&key).await
      } else {
        cache.get::<serde_json::Value>(&key).await
      };
      match value {
        Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        None => println!("(none)"),
      }
    }
    CacheCommand::Set {
      key,
      value,
      ttl_secs,
      secure,
    } => {
      // Bare words are stored as strings
      let value: serde_json::Value =
        serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
      let ttl = ttl_secs.map(Duration::from_secs);
      if secure {
        cache.set_secure(&key, &value, ttl).await?;
      } else {
        cache.set(&key, &value, ttl).await?;
      }
    }
    CacheCommand::Remove { key, secure } => {
      if secure {
        cache.remove_secure(&key).await;
      } else {
        cache.remove(&key).await;
      }
    }
    CacheCommand::Clear { secure } => {
      if secure {
        cache.clear_secure().await;
      } else {
        cache.clear().await;
      }
    }
  }
  Ok(())
}
