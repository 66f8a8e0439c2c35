use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::{APP_NAME, Settings};

/// Pick the cache root: an explicit override wins, then the configured
/// `cache_dir`, then `<data dir>/litcache/storage`.
pub fn resolve_cache_root(settings: &Settings, cli_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = cli_override {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &settings.cache_dir {
        return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data_dir.join(APP_NAME).join("storage"))
}

/// Compute the log file path, creating its directory.
/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;

    let log_dir = base.join(APP_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join("litcache.log"))
}
