//! Layered configuration: optional TOML file, then `BUDDY_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use buddy_alerts::AlertConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// SQLite database file; a leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Email of the acting user.
  #[serde(default)]
  pub user:       Option<String>,
  /// Display name used when the profile is first created.
  #[serde(default)]
  pub name:       Option<String>,
  #[serde(default)]
  pub alerts:     AlertConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/buddy/buddy.db") }

impl AppConfig {
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("BUDDY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise configuration")
  }
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
