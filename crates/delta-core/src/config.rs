//! Configuration management for Delta.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/delta/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// HTTP client settings shared by the remote sources
    pub network: NetworkConfig,
    /// Search fan-out settings
    pub search: SearchConfig,
    /// Terminal presentation settings
    pub display: DisplayConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `DELTA_CACHE_DIR`: Override the snapshot cache directory
    /// - `DELTA_TIMEOUT_SECS`: Override the per-request HTTP timeout
    /// - `DELTA_CONCURRENT_SECTIONS`: Override how many sections run at once
    /// - `NO_COLOR`: Disable colored output when set to any value
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("DELTA_CACHE_DIR") {
            tracing::debug!("Override general.cache_dir from env: {}", dir);
            self.general.cache_dir = Some(PathBuf::from(dir));
        }

        if let Some(val) = lookup("DELTA_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.network.timeout_secs = secs;
                tracing::debug!("Override network.timeout_secs from env: {}", secs);
            }
        }

        if let Some(val) = lookup("DELTA_CONCURRENT_SECTIONS") {
            if let Ok(count) = val.parse() {
                self.search.concurrent_sections = count;
                tracing::debug!("Override search.concurrent_sections from env: {}", count);
            }
        }

        if lookup("NO_COLOR").is_some() {
            self.display.color = false;
        }
    }

    /// Reject values that would stall the search pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.search.concurrent_sections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.concurrent_sections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.parse_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.parse_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Directory holding downloaded snapshots.
    ///
    /// Uses `general.cache_dir` when set, otherwise `~/.cache/delta`.
    pub fn snapshot_dir(&self) -> ConfigResult<PathBuf> {
        match &self.general.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::cache_dir(),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/delta/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "delta", "delta").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the cache directory path.
    ///
    /// Uses XDG base directories: `~/.cache/delta`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "delta", "delta").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.cache_dir().to_path_buf())
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Snapshot cache directory (defaults to the platform cache dir)
    pub cache_dir: Option<PathBuf>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!(
                "delta/{} (+https://github.com/delta-vuln/delta)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Search fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of sections allowed to run at once (1 = sequential)
    pub concurrent_sections: usize,
    /// Number of snapshot files parsed at once within one section
    pub parse_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrent_sections: 4,
            parse_concurrency: 8,
        }
    }
}

/// Terminal presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Emit ANSI colors
    pub color: bool,
    /// Prefix section titles and group labels with icons
    pub icons: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color: true,
            icons: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.general.cache_dir.is_none());
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.search.concurrent_sections, 4);
        assert_eq!(config.search.parse_concurrency, 8);
        assert!(config.display.color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[network]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[display]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.network.user_agent, config.network.user_agent);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.general.cache_dir = Some(tmp.path().join("cache"));
        config.search.concurrent_sections = 1;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.general.cache_dir, Some(tmp.path().join("cache")));
        assert_eq!(loaded.search.concurrent_sections, 1);
        assert_eq!(
            loaded.snapshot_dir().expect("snapshot dir"),
            tmp.path().join("cache")
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DELTA_CACHE_DIR", "/tmp/delta-cache"),
            ("DELTA_TIMEOUT_SECS", "5"),
            ("DELTA_CONCURRENT_SECTIONS", "not-a-number"),
            ("NO_COLOR", ""),
        ]);

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.general.cache_dir,
            Some(PathBuf::from("/tmp/delta-cache"))
        );
        assert_eq!(config.network.timeout_secs, 5);
        // Unparseable value leaves the default in place
        assert_eq!(config.search.concurrent_sections, 4);
        assert!(!config.display.color);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.search.concurrent_sections = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[network]
timeout_secs = 10

[display]
color = false
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.network.timeout_secs, 10);
        assert!(!config.display.color);
        // These should be defaults
        assert_eq!(config.search.concurrent_sections, 4);
        assert!(config.display.icons);
    }
}
