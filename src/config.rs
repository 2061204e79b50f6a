use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::{BaseOptions, ReadOptions, WriteOptions};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Database file (defaults to the platform data directory)
  pub database: Option<PathBuf>,
  /// When false, writes are discarded and every read misses
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// Device time-to-live in seconds; -1 never expires, 0 disables retention
  #[serde(default)]
  pub default_ttl: BaseOptions,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      database: None,
      enabled: default_enabled(),
      default_ttl: BaseOptions::default(),
    }
  }
}

fn default_enabled() -> bool {
  true
}

impl CacheConfig {
  pub fn read_options(&self) -> ReadOptions {
    self.default_ttl.into()
  }

  pub fn write_options(&self) -> WriteOptions {
    self.default_ttl.into()
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Directory for rolling log files (defaults to the platform data directory)
  pub directory: Option<PathBuf>,
  /// Mirror log output to stderr
  #[serde(default)]
  pub stderr: bool,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./doccache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/doccache/config.yaml
  ///
  /// Without any config file the defaults apply.
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
    let local = PathBuf::from("doccache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("doccache").join("config.yaml");
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

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{DEFAULT_ONE_HOUR, INFINITE};
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert!(config.cache.enabled);
    assert!(config.cache.database.is_none());
    assert_eq!(
      config.cache.read_options().device_time_to_live(),
      DEFAULT_ONE_HOUR
    );
    assert!(!config.log.stderr);
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      "cache:\n  database: /tmp/docs.db\n  enabled: false\n  default_ttl: -1\nlog:\n  directory: /tmp/logs\n  stderr: true\n",
    )
    .unwrap();
    assert_eq!(config.cache.database, Some(PathBuf::from("/tmp/docs.db")));
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.write_options().device_time_to_live(), INFINITE);
    assert_eq!(config.log.directory, Some(PathBuf::from("/tmp/logs")));
    assert!(config.log.stderr);
  }

  #[test]
  fn test_negative_ttl_rejected() {
    assert!(Config::parse("cache:\n  default_ttl: -100\n").is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  default_ttl: 120").unwrap();
    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache.read_options().device_time_to_live(), 120);
  }

  #[test]
  fn test_load_missing_explicit_path_fails() {
    assert!(Config::load(Some(Path::new("/nonexistent/doccache.yaml"))).is_err());
  }
}
