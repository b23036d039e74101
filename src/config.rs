//! Configuration types.
//!
//! Every field is optional in the YAML file; missing fields fall back to
//! platform directories.
//!
//! ```yaml
//! cache:
//!   dir: /var/cache/stashguard
//!   default_ttl_secs: 3600
//! rules:
//!   database: /var/lib/stashguard/rules.db
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Name of the directory created under platform cache/data roots.
pub const APP_DIR_NAME: &str = "stashguard";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub rules: RulesConfig,
}

/// Cache store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of all cache entries
    pub dir: PathBuf,
    /// TTL applied by `read_fresh`/`read_list_fresh`, in seconds
    pub default_ttl_secs: Option<u64>,
}

impl CacheConfig {
    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME),
            default_ttl_secs: None,
        }
    }
}

/// Rule store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// SQLite database holding the block rules
    pub database: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
                .join("rules.db"),
        }
    }
}

impl Config {
    /// Parse configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Check that paths are usable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.as_os_str().is_empty() {
            return Err(Error::Config("cache.dir must not be empty".to_string()));
        }
        if self.rules.database.as_os_str().is_empty() {
            return Err(Error::Config(
                "rules.database must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
cache:
  dir: /tmp/sg-cache
  default_ttl_secs: 3600
rules:
  database: /tmp/sg/rules.db
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/sg-cache"));
        assert_eq!(config.cache.default_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(config.rules.database, PathBuf::from("/tmp/sg/rules.db"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_yaml_str("cache:\n  default_ttl_secs: 60\n").unwrap();
        assert_eq!(config.cache.dir, CacheConfig::default().dir);
        assert_eq!(config.rules, RulesConfig::default());
        assert!(config.cache.dir.ends_with(APP_DIR_NAME));
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = Config::from_yaml_str("rules:\n  database: \"\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = Config::from_yaml_str("cache: [not, a, map]");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "cache:\n  dir: /x\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/x"));
        assert_eq!(config.cache.default_ttl(), None);

        assert!(Config::load(dir.path().join("missing.yml")).is_err());
    }
}
