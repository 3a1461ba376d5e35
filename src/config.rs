use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 10;

/// Client preferences, read at startup and written back whenever the user
/// changes one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of a `workplan serve` instance. Unset means the local database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Seconds between background syncs; `0` disables them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<u64>,
    /// Per-column visibility. Columns not listed are visible.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, bool>,
}

impl ClientConfig {
    /// Returns the default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(p) = path.to_str() {
            paths::ensure_parent_dir(p)?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL_SECS))
    }

    pub fn set_sync_interval(&mut self, interval: Duration) {
        self.sync_interval = Some(interval.as_secs());
    }

    pub fn is_visible(&self, column: &str) -> bool {
        self.columns.get(column).copied().unwrap_or(true)
    }

    pub fn set_visible(&mut self, column: &str, visible: bool) {
        if visible {
            self.columns.remove(column);
        } else {
            self.columns.insert(column.to_string(), false);
        }
    }

    /// `columns` with hidden ones filtered out, order preserved.
    pub fn visible_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| self.is_visible(c))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_returns_default() {
        let config = ClientConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.sync_interval(), Duration::from_secs(10));
        assert!(config.is_visible("planned"));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
server = "http://localhost:3000"
sync_interval = 0

[columns]
archives = false
planned = true
"#;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(toml.as_bytes()).unwrap();

        let config = ClientConfig::load_from(f.path()).unwrap();
        assert_eq!(config.server.as_deref(), Some("http://localhost:3000"));
        assert!(config.sync_interval().is_zero());
        assert!(!config.is_visible("archives"));
        assert!(config.is_visible("planned"));
        assert!(config.is_visible("in-progress"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"sync_intervall = 5\n").unwrap();
        let err = ClientConfig::load_from(f.path()).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = ClientConfig::default();
        config.set_sync_interval(Duration::from_secs(30));
        config.set_visible("archives", false);
        config.save_to(&path).unwrap();

        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        config.set_visible("archives", true);
        assert!(config.columns.is_empty());
    }

    #[test]
    fn visible_columns_keeps_order() {
        let mut config = ClientConfig::default();
        config.set_visible("planned", false);
        let all: Vec<String> = ["future-plans", "planned", "in-progress"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(config.visible_columns(&all), vec!["future-plans", "in-progress"]);
    }
}
