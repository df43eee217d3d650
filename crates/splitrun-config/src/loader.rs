//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{ProjectConfig, RunnerConfig, SuitesConfig, OutputConfig};
use crate::{ConfigError, ConfigResult, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the output directory
pub const ENV_OUTPUT_DIR: &str = "SPLITRUN_OUTPUT_DIR";
/// Overrides the worker count
pub const ENV_JOBS: &str = "SPLITRUN_JOBS";
/// Overrides parallel execution
pub const ENV_PARALLEL: &str = "SPLITRUN_PARALLEL";
/// Overrides the functional name pattern
pub const ENV_FUNCTIONAL_PATTERN: &str = "SPLITRUN_FUNCTIONAL_PATTERN";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.splitrun/config.toml) - lowest priority
/// 2. Project config (./splitrun.toml) - overrides global
/// 3. Environment variables (SPLITRUN_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration, with global defaults and env overrides applied
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where splitrun.toml was found)
    pub project_root: Option<PathBuf>,

    /// Directory the search started from
    pub base_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.splitrun/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find splitrun.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;
        self.finish(project_config, project_root, start_dir.to_path_buf())
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let project_root = config_path
            .parent()
            .map(|p| {
                if p.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    p.to_path_buf()
                }
            });
        let base_dir = project_root.clone().unwrap_or_else(|| PathBuf::from("."));
        self.finish(project_config, project_root, base_dir)
    }

    fn finish(
        &mut self,
        project_config: ProjectConfig,
        project_root: Option<PathBuf>,
        base_dir: PathBuf,
    ) -> ConfigResult<Config> {
        let global_config = self.load_global_config()?;
        let project_config = apply_global_defaults(project_config, &global_config);
        let project_config = self.apply_env_overrides(project_config)?;
        project_config.validate()?;

        tracing::debug!(
            root = ?project_root,
            functional_pattern = project_config.functional_pattern(),
            "configuration loaded"
        );

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
            base_dir,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); the default config when no file exists
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.splitrun/config.toml
    ///
    /// A missing file or home directory yields the defaults; a broken file is an error.
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            match GlobalConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => GlobalConfig::load_from_file(path),
            _ => Ok(GlobalConfig::default()),
        }
    }

    /// Apply environment variable overrides to project config
    ///
    /// Unparseable values are reported instead of ignored.
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Some(dir) = read_env(ENV_OUTPUT_DIR) {
            config
                .output
                .get_or_insert_with(OutputConfig::default)
                .dir = Some(PathBuf::from(dir));
        }

        if let Some(jobs) = read_env(ENV_JOBS) {
            let jobs = jobs.parse::<usize>().ok().filter(|j| *j > 0).ok_or_else(|| {
                ConfigError::InvalidEnv {
                    var: ENV_JOBS.to_string(),
                    reason: format!("expected a positive integer, got '{}'", jobs),
                }
            })?;
            config.runner.get_or_insert_with(RunnerConfig::default).jobs = Some(jobs);
        }

        if let Some(parallel) = read_env(ENV_PARALLEL) {
            let parallel = parse_bool(&parallel).ok_or_else(|| ConfigError::InvalidEnv {
                var: ENV_PARALLEL.to_string(),
                reason: format!("expected true or false, got '{}'", parallel),
            })?;
            config.runner.get_or_insert_with(RunnerConfig::default).parallel = Some(parallel);
        }

        if let Some(pattern) = read_env(ENV_FUNCTIONAL_PATTERN) {
            config
                .suites
                .get_or_insert_with(SuitesConfig::default)
                .functional_pattern = Some(pattern);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fill runner settings the project leaves unset from the user defaults
fn apply_global_defaults(mut config: ProjectConfig, global: &GlobalConfig) -> ProjectConfig {
    if global.default_jobs().is_none() && global.default_parallel().is_none() {
        return config;
    }
    let runner = config.runner.get_or_insert_with(RunnerConfig::default);
    if runner.jobs.is_none() {
        runner.jobs = global.default_jobs();
    }
    if runner.parallel.is_none() {
        runner.parallel = global.default_parallel();
    }
    config
}

impl Config {
    /// Configuration for a directory without any files
    pub fn defaults_for(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
            base_dir: base_dir.into(),
        }
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Directory relative paths are resolved against
    pub fn root(&self) -> &Path {
        self.project_root.as_deref().unwrap_or(&self.base_dir)
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    /// Absolute output directory
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.project.output_dir())
    }

    /// Absolute test source roots
    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.project
            .source_roots()
            .iter()
            .map(|root| self.resolve(root))
            .collect()
    }

    /// Working directory for case commands
    pub fn working_dir(&self) -> PathBuf {
        match self.project.runner_working_dir() {
            Some(dir) => self.resolve(dir),
            None => self.root().to_path_buf(),
        }
    }

    /// Project name, falling back to the root directory name
    pub fn project_name(&self) -> String {
        self.project
            .project_name()
            .map(str::to_string)
            .or_else(|| {
                self.root()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "project".to_string())
    }

    /// Whether colored output is disabled by the user defaults
    pub fn no_color(&self) -> bool {
        self.global.no_color()
    }

    /// Check if this is a project (has splitrun.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
