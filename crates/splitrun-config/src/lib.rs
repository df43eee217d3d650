//! Splitrun Configuration System
//!
//! Provides configuration management for splitrun including:
//! - Project configuration (splitrun.toml)
//! - Global user configuration (~/.splitrun/config.toml)
//! - Environment variable overrides (SPLITRUN_*)
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.splitrun/config.toml)
//! 2. Project config (./splitrun.toml, searched upwards)
//! 3. Environment variables (SPLITRUN_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use splitrun_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("writing reports to {}", config.output_dir().display());
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "splitrun.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid value for environment variable {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{
    CaseConfig, CoverageConfig, CoverageFormat, OutputConfig, ProjectConfig, RunnerConfig,
    SourcesConfig, SuiteConfig, SuiteSettings, SuitesConfig,
};
