use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use doccache::config::LogConfig;

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "DOCCACHE_LOG";

/// Install a daily-rolling file subscriber, optionally mirrored to stderr.
///
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init(config: &LogConfig, verbose: bool) -> Result<WorkerGuard> {
  let directory = match &config.directory {
    Some(dir) => dir.clone(),
    None => default_log_dir()?,
  };
  std::fs::create_dir_all(&directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&directory, "doccache.log"));

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr = (config.stderr || verbose).then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to init logging: {}", e))?;

  Ok(guard)
}

fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("doccache").join("logs"))
}
