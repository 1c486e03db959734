//! Loader configuration, deserialised from the layered `config` sources.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use vetdw_core::{dimension::HistoryMode, fact::FactRules, store::LoadContext};

#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
  /// Operational database, read-only.
  pub source_path:       PathBuf,
  /// Warehouse database, attached as `dw` and created if absent.
  pub warehouse_path:    PathBuf,
  /// Reference date for the run; the local date when unset.
  #[serde(default)]
  pub today:             Option<NaiveDate>,
  #[serde(default)]
  pub history:           HistoryMode,
  #[serde(default)]
  pub rules:             FactRules,
  #[serde(default = "default_record_rejections")]
  pub record_rejections: bool,
}

fn default_record_rejections() -> bool { true }

impl EtlConfig {
  pub fn load_context(&self) -> LoadContext {
    LoadContext {
      today:             self.today.unwrap_or_else(|| Local::now().date_naive()),
      history:           self.history,
      rules:             self.rules.clone(),
      record_rejections: self.record_rejections,
    }
  }

  /// Both database paths with a leading `~` expanded.
  pub fn resolved_paths(&self) -> (PathBuf, PathBuf) {
    (expand_tilde(&self.source_path), expand_tilde(&self.warehouse_path))
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
