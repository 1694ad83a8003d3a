//! Preflight configuration
//!
//! Stored in `~/.config/drydock/preflight.yaml`:
//!
//! ```yaml
//! maxConcurrentChecks: 4
//! strictTemplates: true
//! database: /var/lib/drydock/drydock.db
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KubeError, Result};

/// Default number of preflight runs executing at once
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 4;

/// Preflight orchestration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightConfig {
    /// Upper bound on concurrently executing checks; `null` for no bound
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: Option<usize>,

    /// Fail renders that reference undefined variables
    #[serde(default = "default_strict_templates")]
    pub strict_templates: bool,

    /// SQLite database holding apps and downstream versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

fn default_max_concurrent_checks() -> Option<usize> {
    Some(DEFAULT_MAX_CONCURRENT_CHECKS)
}

fn default_strict_templates() -> bool {
    true
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: default_max_concurrent_checks(),
            strict_templates: default_strict_templates(),
            database: None,
        }
    }
}

impl PreflightConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            KubeError::InvalidConfig("could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("drydock").join("preflight.yaml"))
    }

    /// Database location, defaulting to the user data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => crate::storage::SqliteStore::default_path(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_checks == Some(0) {
            return Err(KubeError::InvalidConfig(
                "maxConcurrentChecks must be at least 1, or null for no limit".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PreflightConfig::default();
        assert_eq!(config.max_concurrent_checks, Some(4));
        assert!(config.strict_templates);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: PreflightConfig = serde_yaml::from_str("strictTemplates: false\n").unwrap();
        assert_eq!(config.max_concurrent_checks, Some(4));
        assert!(!config.strict_templates);
    }

    #[test]
    fn test_null_means_unbounded() {
        let config: PreflightConfig = serde_yaml::from_str("maxConcurrentChecks: null\n").unwrap();
        assert_eq!(config.max_concurrent_checks, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("preflight.yaml");

        let config = PreflightConfig {
            max_concurrent_checks: Some(2),
            strict_templates: false,
            database: Some(dir.path().join("drydock.db")),
        };
        config.save_to(&path).unwrap();

        let loaded = PreflightConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.database_path().unwrap(), dir.path().join("drydock.db"));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preflight.yaml");
        std::fs::write(&path, "maxConcurrentChecks: 0\n").unwrap();

        let result = PreflightConfig::load_from(&path);
        assert!(matches!(result, Err(KubeError::InvalidConfig(_))));
    }
}
