//! Project Configuration (splitrun.toml)
//!
//! Handles project-level configuration stored in `splitrun.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directories searched for test sources
pub const DEFAULT_SOURCE_ROOTS: &[&str] = &["src/test"];
/// Default file extensions considered during discovery
pub const DEFAULT_EXTENSIONS: &[&str] = &["java", "kt"];
/// Default file stem patterns considered during discovery
pub const DEFAULT_DISCOVERY_PATTERNS: &[&str] = &["*Test", "*Tests"];
/// Default name pattern that marks a functional test
pub const DEFAULT_FUNCTIONAL_PATTERN: &str = "*FunctionalTest";
/// Default output directory, relative to the project root
pub const DEFAULT_OUTPUT_DIR: &str = "build/splitrun";

/// Project configuration from splitrun.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSection>,

    /// Test source discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourcesConfig>,

    /// How discovered cases are executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerConfig>,

    /// Suite partitioning and per-suite overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suites: Option<SuitesConfig>,

    /// Explicitly declared cases
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<CaseConfig>,

    /// Coverage report settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageConfig>,

    /// Output locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Project name, used in report titles
    pub name: String,
}

/// Test source discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Directories to walk (default: ["src/test"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<PathBuf>>,

    /// File extensions to consider (default: ["java", "kt"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// File stem patterns that mark a test case (default: ["*Test", "*Tests"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

/// Runner configuration shared by every suite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Command template; `{name}`, `{simple}` and `{file}` are substituted per case
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Working directory for commands (default: project root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Run cases in parallel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Maximum number of cases running at once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Per-case timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Suite partitioning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SuitesConfig {
    /// Pattern selecting functional cases (default: "*FunctionalTest")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional_pattern: Option<String>,

    /// Overrides for the unit suite (also used by the default `test` run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<SuiteConfig>,

    /// Overrides for the functional suite
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functional: Option<SuiteConfig>,
}

/// Per-suite overrides of the runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Extra environment passed to every case of the suite
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// An explicitly declared, command-backed case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    /// Fully-qualified case name
    pub name: String,

    /// Program and arguments
    pub command: Vec<String>,

    /// Working directory (default: runner working directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// Coverage report output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CoverageFormat {
    Html,
    Json,
    Csv,
}

impl CoverageFormat {
    pub const ALL: &'static [CoverageFormat] =
        &[CoverageFormat::Html, CoverageFormat::Json, CoverageFormat::Csv];
}

/// Coverage report configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CoverageConfig {
    /// Generate the coverage report after `test` (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Report formats (default: all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<CoverageFormat>>,

    /// Fail the report stage below this covered-line ratio (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_line_ratio: Option<f64>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory (default: "build/splitrun")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Write JUnit XML results per suite (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junit: Option<bool>,
}

/// Effective settings for one suite after defaults and overrides
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuiteSettings {
    pub parallel: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
    pub env: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(project) = &self.project {
            if project.name.trim().is_empty() {
                return Err(ConfigError::invalid("project.name", "name cannot be empty"));
            }
        }

        if let Some(sources) = &self.sources {
            if let Some(patterns) = &sources.patterns {
                if patterns.is_empty() {
                    return Err(ConfigError::invalid(
                        "sources.patterns",
                        "at least one pattern is required",
                    ));
                }
                for pattern in patterns {
                    validate_pattern("sources.patterns", pattern)?;
                }
            }
            if let Some(extensions) = &sources.extensions {
                if extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
                    return Err(ConfigError::invalid(
                        "sources.extensions",
                        "extensions are written without a leading dot",
                    ));
                }
            }
        }

        if let Some(runner) = &self.runner {
            if let Some(command) = &runner.command {
                validate_command("runner.command", command)?;
            }
            validate_jobs("runner.jobs", runner.jobs)?;
            validate_timeout("runner.timeout_secs", runner.timeout_secs)?;
        }

        if let Some(suites) = &self.suites {
            if let Some(pattern) = &suites.functional_pattern {
                validate_pattern("suites.functional_pattern", pattern)?;
            }
            for (section, suite) in [("unit", &suites.unit), ("functional", &suites.functional)] {
                if let Some(suite) = suite {
                    validate_jobs(&format!("suites.{}.jobs", section), suite.jobs)?;
                    validate_timeout(&format!("suites.{}.timeout_secs", section), suite.timeout_secs)?;
                    for key in suite.env.keys() {
                        if key.is_empty() || key.contains('=') {
                            return Err(ConfigError::invalid(
                                format!("suites.{}.env", section),
                                format!("invalid variable name '{}'", key),
                            ));
                        }
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.name.trim().is_empty() {
                return Err(ConfigError::invalid("cases.name", "name cannot be empty"));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(ConfigError::invalid(
                    "cases.name",
                    format!("case '{}' is declared twice", case.name),
                ));
            }
            validate_command(&format!("cases.{}.command", case.name), &case.command)?;
        }

        if let Some(coverage) = &self.coverage {
            if let Some(ratio) = coverage.minimum_line_ratio {
                if !(0.0..=1.0).contains(&ratio) {
                    return Err(ConfigError::invalid(
                        "coverage.minimum_line_ratio",
                        format!("must be between 0.0 and 1.0, got {}", ratio),
                    ));
                }
            }
            if let Some(formats) = &coverage.formats {
                if formats.is_empty() {
                    return Err(ConfigError::invalid(
                        "coverage.formats",
                        "at least one format is required",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Get the project name, if present
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.name.as_str())
    }

    /// Test source roots, relative to the project root
    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.sources
            .as_ref()
            .and_then(|s| s.roots.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_ROOTS.iter().map(PathBuf::from).collect())
    }

    /// File extensions considered during discovery
    pub fn source_extensions(&self) -> Vec<String> {
        self.sources
            .as_ref()
            .and_then(|s| s.extensions.clone())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect())
    }

    /// File stem patterns that mark a test case
    pub fn discovery_patterns(&self) -> Vec<String> {
        self.sources
            .as_ref()
            .and_then(|s| s.patterns.clone())
            .unwrap_or_else(|| {
                DEFAULT_DISCOVERY_PATTERNS
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            })
    }

    /// Pattern selecting functional cases
    pub fn functional_pattern(&self) -> &str {
        self.suites
            .as_ref()
            .and_then(|s| s.functional_pattern.as_deref())
            .unwrap_or(DEFAULT_FUNCTIONAL_PATTERN)
    }

    /// Command template for discovered cases
    pub fn runner_command(&self) -> Option<&[String]> {
        self.runner.as_ref().and_then(|r| r.command.as_deref())
    }

    /// Working directory for commands, relative to the project root
    pub fn runner_working_dir(&self) -> Option<&Path> {
        self.runner.as_ref().and_then(|r| r.working_dir.as_deref())
    }

    /// Effective settings of the unit suite
    ///
    /// Unit cases run in parallel unless told otherwise.
    pub fn unit_suite(&self) -> SuiteSettings {
        let overrides = self.suites.as_ref().and_then(|s| s.unit.as_ref());
        self.resolve_suite(overrides, true)
    }

    /// Effective settings of the functional suite
    ///
    /// Functional cases share external resources (browsers, servers), so
    /// they run one at a time unless the suite section says otherwise.
    pub fn functional_suite(&self) -> SuiteSettings {
        let overrides = self.suites.as_ref().and_then(|s| s.functional.as_ref());
        let mut settings = self.resolve_suite(overrides, false);
        if overrides.and_then(|o| o.parallel).is_none() {
            settings.parallel = false;
        }
        settings
    }

    fn resolve_suite(&self, overrides: Option<&SuiteConfig>, default_parallel: bool) -> SuiteSettings {
        let runner = self.runner.as_ref();
        let parallel = overrides
            .and_then(|o| o.parallel)
            .or_else(|| runner.and_then(|r| r.parallel))
            .unwrap_or(default_parallel);
        let jobs = overrides
            .and_then(|o| o.jobs)
            .or_else(|| runner.and_then(|r| r.jobs));
        let timeout = overrides
            .and_then(|o| o.timeout_secs)
            .or_else(|| runner.and_then(|r| r.timeout_secs))
            .map(Duration::from_secs);
        let env = overrides.map(|o| o.env.clone()).unwrap_or_default();

        SuiteSettings {
            parallel,
            jobs,
            timeout,
            env,
        }
    }

    /// Whether the coverage report follows the default test run
    pub fn coverage_enabled(&self) -> bool {
        self.coverage
            .as_ref()
            .and_then(|c| c.enabled)
            .unwrap_or(true)
    }

    /// Coverage report formats
    pub fn coverage_formats(&self) -> Vec<CoverageFormat> {
        self.coverage
            .as_ref()
            .and_then(|c| c.formats.clone())
            .unwrap_or_else(|| CoverageFormat::ALL.to_vec())
    }

    /// Minimum covered-line ratio, if verification is configured
    pub fn minimum_line_ratio(&self) -> Option<f64> {
        self.coverage.as_ref().and_then(|c| c.minimum_line_ratio)
    }

    /// Output directory, relative to the project root
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Whether JUnit XML results are written
    pub fn junit_enabled(&self) -> bool {
        self.output.as_ref().and_then(|o| o.junit).unwrap_or(true)
    }
}

fn validate_pattern(field: &str, pattern: &str) -> ConfigResult<()> {
    if pattern.is_empty() {
        return Err(ConfigError::invalid(field, "pattern cannot be empty"));
    }
    if pattern.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(
            field,
            format!("pattern '{}' contains whitespace", pattern),
        ));
    }
    Ok(())
}

fn validate_command(field: &str, command: &[String]) -> ConfigResult<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::invalid(field, "command needs a program")),
    }
}

fn validate_jobs(field: &str, jobs: Option<usize>) -> ConfigResult<()> {
    if jobs == Some(0) {
        return Err(ConfigError::invalid(field, "must be at least 1"));
    }
    Ok(())
}

fn validate_timeout(field: &str, timeout_secs: Option<u64>) -> ConfigResult<()> {
    if timeout_secs == Some(0) {
        return Err(ConfigError::invalid(field, "must be at least 1 second"));
    }
    Ok(())
}
