//! Command implementations

pub mod list;
pub mod run;
pub mod tasks;

use anyhow::{Context, Result};
use colored::*;
use splitrun_config::{Config, ConfigLoader};
use splitrun_harness::{load_cases, NamePattern, Partition, Pipeline, PipelineSettings};
use std::path::PathBuf;
use tracing::debug;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Directory the configuration search starts from
    pub dir: Option<PathBuf>,
    /// Explicit project configuration file
    pub config: Option<PathBuf>,
    pub verbose: bool,
    pub no_color: bool,
    pub json: bool,
    pub sequential: bool,
    pub jobs: Option<usize>,
    /// `--tests` narrowing patterns
    pub tests: Vec<String>,
}

impl GlobalOptions {
    /// Load the layered configuration and apply command line overrides
    pub fn load_config(&self) -> Result<Config> {
        let mut loader = ConfigLoader::new();
        let mut config = match &self.config {
            Some(file) => loader
                .load_from_file(file)
                .with_context(|| format!("Failed to load configuration from {}", file.display()))?,
            None => {
                let dir = match &self.dir {
                    Some(dir) => dir.clone(),
                    None => std::env::current_dir().context("Failed to read current directory")?,
                };
                loader
                    .load_from_directory(&dir)
                    .with_context(|| format!("Failed to load configuration for {}", dir.display()))?
            }
        };

        if let Some(jobs) = self.jobs {
            anyhow::ensure!(jobs > 0, "--jobs must be at least 1");
        }

        // Flags beat both the runner section and the per-suite sections
        let runner = config.project.runner.get_or_insert_with(Default::default);
        if self.sequential {
            runner.parallel = Some(false);
        }
        if self.jobs.is_some() {
            runner.jobs = self.jobs;
        }
        if let Some(suites) = config.project.suites.as_mut() {
            for suite in [suites.unit.as_mut(), suites.functional.as_mut()]
                .into_iter()
                .flatten()
            {
                if self.sequential {
                    suite.parallel = Some(false);
                }
                if self.jobs.is_some() {
                    suite.jobs = self.jobs;
                }
            }
        }

        debug!(root = %config.root().display(), "configuration ready");
        Ok(config)
    }

    /// Whether colors are off, by flag, environment or user defaults
    pub fn colors_disabled(&self, config: &Config) -> bool {
        self.no_color || config.no_color()
    }
}

/// A loaded project ready to run tasks
pub struct Workspace {
    pub config: Config,
    pub pipeline: Pipeline,
    /// Non-fatal problems found while collecting cases
    pub problems: Vec<(PathBuf, String)>,
}

impl Workspace {
    pub fn load(options: &GlobalOptions) -> Result<Self> {
        let config = options.load_config()?;

        let partition = Partition::new(config.project.functional_pattern())
            .context("Invalid functional pattern")?;
        let narrowing =
            NamePattern::parse_all(&options.tests).context("Invalid --tests pattern")?;
        let cases = load_cases(&config).context("Failed to collect test cases")?;

        let settings = PipelineSettings::from_config(&config).with_narrowing(narrowing);
        let pipeline = Pipeline::new(cases.registry, partition, settings);

        Ok(Self {
            config,
            pipeline,
            problems: cases.problems,
        })
    }

    /// Print discovery problems to stderr
    pub fn print_problems(&self) {
        if self.problems.is_empty() {
            return;
        }
        eprintln!("{}", "Problems while collecting test cases:".yellow().bold());
        for (path, problem) in &self.problems {
            eprintln!("  {} {}", "●".yellow(), path.display());
            eprintln!("    {}", problem.dimmed());
        }
        eprintln!();
    }
}
