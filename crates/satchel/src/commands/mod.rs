//! CLI command implementations

pub mod deliver;
pub mod status;
pub mod validate;
pub mod verify;

use anyhow::{Context, Result};
use camino::Utf8Path;
use satchel_core::SatchelConfig;
use satchel_ledger::JsonlStatusLog;

/// Load the configuration file, searching the default locations when no path is given
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<SatchelConfig> {
    SatchelConfig::load(path).context("Failed to load configuration")
}

pub(crate) fn open_status_log(config: &SatchelConfig) -> JsonlStatusLog {
    JsonlStatusLog::new(config.status_log_dir.as_std_path())
}
