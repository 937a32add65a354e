use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read framework config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse framework config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Framework-wide settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Worker threads for parallel regions. `0` means one per logical CPU.
    pub workers: usize,
    /// Managed algorithm instances kept before the oldest idle one is dropped.
    pub max_retained_algorithms: usize,
    /// Smallest change in overall progress that produces a notification.
    pub progress_notify_step: f64,
    /// Whether top-level algorithms propagate execution errors by default.
    pub rethrow_by_default: bool,
    /// Whether successful executions are recorded in the history log.
    pub record_history: bool,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_retained_algorithms: 100,
            progress_notify_step: 0.01,
            rethrow_by_default: false,
            record_history: true,
        }
    }
}

impl FrameworkConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads `path`, or the per-user config file when `path` is `None`,
    /// falling back to defaults when nothing usable is found.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Self::default(),
            },
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(?err, path = %path.display(), "using default framework config");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir()?;
        base.push("Tessera");
        base.push("framework.json");
        Some(base)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framework.json");
        fs::write(&path, r#"{ "workers": 3, "rethrow_by_default": true }"#).unwrap();

        let config = FrameworkConfig::load(&path).unwrap();
        assert_eq!(config.worker_count(), 3);
        assert!(config.rethrow_by_default);
        assert_eq!(config.max_retained_algorithms, 100);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("framework.json");
        let config = FrameworkConfig {
            progress_notify_step: 0.1,
            record_history: false,
            ..FrameworkConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(FrameworkConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framework.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(FrameworkConfig::load(&path), Err(ConfigError::Parse(_))));
        assert_eq!(
            FrameworkConfig::load_or_default(Some(&path)),
            FrameworkConfig::default()
        );
    }

    #[test]
    fn zero_workers_means_every_cpu() {
        assert!(FrameworkConfig::default().worker_count() >= 1);
    }
}
