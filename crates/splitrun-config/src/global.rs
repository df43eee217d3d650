//! Global Configuration (~/.splitrun/config.toml)
//!
//! Handles user-level defaults stored in `~/.splitrun/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.splitrun/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default settings applied to every project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Worker count when neither the project nor the CLI sets one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Run cases in parallel when the project does not say
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Disable colored output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_color: Option<bool>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if defaults.jobs == Some(0) {
                return Err(ConfigError::invalid("defaults.jobs", "must be at least 1"));
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.splitrun/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".splitrun").join("config.toml"))
    }

    pub fn default_jobs(&self) -> Option<usize> {
        self.defaults.as_ref().and_then(|d| d.jobs)
    }

    pub fn default_parallel(&self) -> Option<bool> {
        self.defaults.as_ref().and_then(|d| d.parallel)
    }

    pub fn no_color(&self) -> bool {
        self.defaults
            .as_ref()
            .and_then(|d| d.no_color)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_config() {
        let toml = r#"
[defaults]
jobs = 8
no_color = true
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_jobs(), Some(8));
        assert_eq!(config.default_parallel(), None);
        assert!(config.no_color());
    }

    #[test]
    fn test_empty_global_config() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
        assert!(!config.no_color());
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let config: GlobalConfig = toml::from_str("[defaults]\njobs = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(toml::from_str::<GlobalConfig>("[lsp]\nhover = true\n").is_err());
    }
}
