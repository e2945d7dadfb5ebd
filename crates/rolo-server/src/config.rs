//! Server configuration: a TOML file layered with `ROLO_` environment
//! variables. Nested keys use `__`, e.g. `ROLO_INTEGRITY__CACHE__DEFAULT_TTL_SECS`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, Environment, File};
use rolo_integrity::IntegrityConfig;
use serde::Deserialize;

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub integrity:  IntegrityConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/rolo/rolo.db"),
      integrity:  IntegrityConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Read `path` (optional) and the process environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> { Self::from_sources(path, environment()) }

  fn from_sources(path: &Path, env: Environment) -> anyhow::Result<Self> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(env)
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn environment() -> Environment {
  Environment::with_prefix("ROLO")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
