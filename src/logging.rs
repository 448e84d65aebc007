use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize file logging.
///
/// Logs go to `$XDG_DATA_HOME/appsession/logs/appsession.log.YYYY-MM-DD`,
/// keeping stdout free for command output. The level comes from RUST_LOG
/// (default `appsession=info`).
///
/// The returned guard flushes buffered lines on drop; hold it for the life
/// of the process.
pub fn init() -> Result<WorkerGuard> {
  let log_dir = log_dir()?;

  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let file_appender = tracing_appender::rolling::daily(&log_dir, "appsession.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appsession=info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize tracing subscriber: {}", e))?;

  tracing::debug!("logging to {}", log_dir.display());

  Ok(guard)
}

fn log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("appsession").join("logs"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_dir() {
    let dir = log_dir().unwrap();
    assert!(dir.ends_with("appsession/logs"));
  }
}
