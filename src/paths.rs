//! Where workplan keeps its files. Everything lives under `~/.workplan` unless
//! overridden by environment.

use std::path::Path;

use anyhow::{Context, Result};

fn data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    format!("{home}/.workplan")
}

/// Resolve the database path.
/// Checks `WORKPLAN_DB`, falls back to `$HOME/.workplan/workplan.db`.
pub fn db_path() -> String {
    std::env::var("WORKPLAN_DB").unwrap_or_else(|_| format!("{}/workplan.db", data_dir()))
}

/// Checks `WORKPLAN_CONFIG`, falls back to `$HOME/.workplan/config.toml`.
pub fn config_path() -> String {
    std::env::var("WORKPLAN_CONFIG").unwrap_or_else(|_| format!("{}/config.toml", data_dir()))
}

/// Log file for the terminal board, which can't log to a terminal it owns.
pub fn log_path() -> String {
    format!("{}/workplan.log", data_dir())
}

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}
