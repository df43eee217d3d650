//! Build the case registry of a configured project
//!
//! Declared `[[cases]]` are registered first; discovered sources follow and
//! run through the `[runner] command` template.

use crate::case::{CaseContext, CaseError, CommandCase, Executable};
use crate::discovery::{Discovery, DiscoveryOptions};
use crate::error::{HarnessError, HarnessResult};
use crate::pattern::NamePattern;
use crate::registry::TestRegistry;
use splitrun_config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cases of a project and whatever went wrong finding them
#[derive(Debug, Default)]
pub struct ProjectCases {
    pub registry: TestRegistry,
    /// Non-fatal discovery problems
    pub problems: Vec<(PathBuf, String)>,
}

/// Discovery settings described by a configuration
pub fn discovery_options(config: &Config) -> HarnessResult<DiscoveryOptions> {
    Ok(DiscoveryOptions {
        roots: config.source_roots(),
        extensions: config.project.source_extensions(),
        patterns: NamePattern::parse_all(config.project.discovery_patterns())?,
    })
}

/// Register every declared and discovered case of a project
///
/// Discovered sources need a runner command; a declared case with the same
/// name wins over a discovered one.
pub fn load_cases(config: &Config) -> HarnessResult<ProjectCases> {
    let mut registry = TestRegistry::new();
    let working_dir = config.working_dir();

    for declared in &config.project.cases {
        let command = CommandCase::from_argv(&declared.command)
            .ok_or_else(|| HarnessError::InvalidCaseName(declared.name.clone()))?;
        let dir = declared
            .working_dir
            .as_deref()
            .map(|d| config.resolve(d))
            .unwrap_or_else(|| working_dir.clone());
        registry.register(declared.name.clone(), command.with_working_dir(dir))?;
    }

    let discovery = Discovery::run(&discovery_options(config)?);
    let mut problems = discovery.problems.clone();

    if !discovery.is_empty() {
        let template = config
            .project
            .runner_command()
            .ok_or(HarnessError::MissingRunnerCommand(discovery.len()))?;

        let mut unusable = Vec::new();
        let collisions = registry.extend_discovered(&discovery, |case| {
            let command = CommandCase::from_template(template, &case.name, Some(&case.file))
                .map(|c| c.with_working_dir(&working_dir));
            match command {
                Some(command) => Arc::new(command) as Arc<dyn Executable>,
                None => {
                    unusable.push(case.file.clone());
                    Arc::new(Unrunnable) as Arc<dyn Executable>
                }
            }
        });

        for name in collisions {
            if let Some(case) = discovery.cases.iter().find(|c| c.name == name) {
                warn!(case = %name, "discovered case shadowed by a declared case");
                problems.push((
                    case.file.clone(),
                    format!("case '{}' is already declared in the configuration", name),
                ));
            }
        }
        for file in unusable {
            problems.push((file, "runner command expands to an empty program".to_string()));
        }
    }

    debug!(cases = registry.len(), problems = problems.len(), "project cases loaded");
    Ok(ProjectCases { registry, problems })
}

/// Placeholder for a case whose command template could not be expanded
struct Unrunnable;

impl Executable for Unrunnable {
    fn execute(&self, _ctx: &mut CaseContext) -> Result<(), CaseError> {
        Err(CaseError::failed("runner command expands to an empty program"))
    }
}
