//! Verification pipeline - the tasks a user can invoke
//!
//! ```text
//! unitTest         unit suite
//! functionalTest   functional suite
//! test             unit suite + execution data, finalized by coverageReport
//! coverageReport   depends on test; renders the coverage report
//! ```
//!
//! `coverageReport` runs after `test` whether the suite passed or not,
//! exactly once per invocation.

use crate::coverage::{CoverageReport, CoverageSummary, ExecutionData};
use crate::error::HarnessResult;
use crate::junit;
use crate::pattern::NamePattern;
use crate::registry::{RegisteredCase, TestRegistry};
use crate::runner::TestRunner;
use crate::suite::{Partition, SuiteKind, SuiteRun};
use chrono::Utc;
use splitrun_config::{Config, CoverageFormat, SuiteSettings};
use splitrun_tasks::{ExecutionReport, TaskExecutor, TaskGraph, TaskNode, TaskOutcome};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub const UNIT_TEST_TASK: &str = "unitTest";
pub const FUNCTIONAL_TEST_TASK: &str = "functionalTest";
pub const DEFAULT_TEST_TASK: &str = "test";
pub const COVERAGE_REPORT_TASK: &str = "coverageReport";

pub const VERIFICATION_GROUP: &str = "verification";
pub const REPORTING_GROUP: &str = "reporting";

/// Exit status when a case failed or a task could not complete
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when every case passed but the coverage stage failed
pub const EXIT_COVERAGE_FAILURE: i32 = 2;

/// Build the task graph of the pipeline
///
/// With coverage disabled `test` has no finalizer; `coverageReport` can
/// still be invoked on its own.
pub fn task_graph(coverage_enabled: bool) -> TaskGraph {
    let mut test = TaskNode::new(DEFAULT_TEST_TASK)
        .with_group(VERIFICATION_GROUP)
        .with_description("Runs the unit tests and records coverage execution data.");
    if coverage_enabled {
        test = test.finalized_by(COVERAGE_REPORT_TASK);
    }

    let tasks = [
        TaskNode::new(UNIT_TEST_TASK)
            .with_group(VERIFICATION_GROUP)
            .with_description("Runs unit tests."),
        TaskNode::new(FUNCTIONAL_TEST_TASK)
            .with_group(VERIFICATION_GROUP)
            .with_description("Runs functional tests."),
        test,
        TaskNode::new(COVERAGE_REPORT_TASK)
            .with_group(REPORTING_GROUP)
            .with_description("Generates the code coverage report for the test task.")
            .depends_on(DEFAULT_TEST_TASK),
    ];

    let mut graph = TaskGraph::new();
    for task in tasks {
        if let Err(e) = graph.add_task(task) {
            warn!(error = %e, "skipping pipeline task");
        }
    }
    graph
}

/// Coverage settings of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSettings {
    /// Whether `test` is finalized by the coverage report
    pub enabled: bool,
    pub formats: Vec<CoverageFormat>,
    pub minimum_line_ratio: Option<f64>,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            formats: CoverageFormat::ALL.to_vec(),
            minimum_line_ratio: None,
        }
    }
}

/// Everything a pipeline needs besides its cases
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Title of the coverage report
    pub project_name: String,
    pub output_dir: PathBuf,
    /// Write JUnit XML results per suite run
    pub junit: bool,
    /// Settings of the unit suite, also used by `test`
    pub unit: SuiteSettings,
    pub functional: SuiteSettings,
    pub coverage: CoverageSettings,
    /// Extra patterns every suite is narrowed by
    pub narrowing: Vec<NamePattern>,
}

impl PipelineSettings {
    /// Defaults writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_name: "project".to_string(),
            output_dir: output_dir.into(),
            junit: true,
            unit: SuiteSettings {
                parallel: true,
                ..Default::default()
            },
            functional: SuiteSettings::default(),
            coverage: CoverageSettings::default(),
            narrowing: Vec::new(),
        }
    }

    /// Settings described by a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let project = &config.project;
        Self {
            project_name: config.project_name(),
            output_dir: config.output_dir(),
            junit: project.junit_enabled(),
            unit: project.unit_suite(),
            functional: project.functional_suite(),
            coverage: CoverageSettings {
                enabled: project.coverage_enabled(),
                formats: project.coverage_formats(),
                minimum_line_ratio: project.minimum_line_ratio(),
            },
            narrowing: Vec::new(),
        }
    }

    pub fn with_narrowing(mut self, patterns: Vec<NamePattern>) -> Self {
        self.narrowing = patterns;
        self
    }

    /// Execution data written by `test`
    pub fn execution_data_path(&self) -> PathBuf {
        self.output_dir.join("coverage").join("test.exec.json")
    }

    /// Directory probe files of command cases go to during `test`
    pub fn probe_dir(&self) -> PathBuf {
        self.output_dir.join("coverage").join("probes")
    }

    /// Directory the coverage report is written to
    pub fn coverage_report_dir(&self) -> PathBuf {
        self.output_dir.join("reports").join("coverage").join(DEFAULT_TEST_TASK)
    }
}

/// Outcome of the coverage stage
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageStage {
    Generated {
        summary: CoverageSummary,
        report_dir: PathBuf,
        files: Vec<PathBuf>,
    },
    Failed {
        message: String,
    },
}

impl CoverageStage {
    pub fn is_success(&self) -> bool {
        matches!(self, CoverageStage::Generated { .. })
    }
}

/// Everything an invocation produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Requested task
    pub task: String,
    /// Suite runs in execution order
    pub suites: Vec<SuiteRun>,
    /// Coverage stage, when it ran
    pub coverage: Option<CoverageStage>,
    /// JUnit files written
    pub results_files: Vec<PathBuf>,
    /// Per-task records from the executor
    pub report: ExecutionReport,
}

impl PipelineOutcome {
    pub fn tests_failed(&self) -> bool {
        self.suites.iter().any(|s| !s.is_success())
    }

    pub fn coverage_failed(&self) -> bool {
        self.coverage.as_ref().map(|c| !c.is_success()).unwrap_or(false)
    }

    /// Process exit status
    ///
    /// Test failures win over coverage failures, so a broken report never
    /// hides a failing case.
    pub fn exit_code(&self) -> i32 {
        let other_task_failed = self
            .report
            .failed_tasks()
            .iter()
            .any(|t| *t != COVERAGE_REPORT_TASK);
        if self.tests_failed() || other_task_failed {
            EXIT_FAILURE
        } else if self.coverage_failed() {
            EXIT_COVERAGE_FAILURE
        } else {
            0
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    /// The run of a given task, if it executed
    pub fn suite(&self, task: &str) -> Option<&SuiteRun> {
        self.suites.iter().find(|s| s.task == task)
    }
}

/// Runs pipeline tasks over a registry
pub struct Pipeline {
    registry: TestRegistry,
    partition: Partition,
    settings: PipelineSettings,
    graph: TaskGraph,
}

impl Pipeline {
    pub fn new(registry: TestRegistry, partition: Partition, settings: PipelineSettings) -> Self {
        let graph = task_graph(settings.coverage.enabled);
        Self {
            registry,
            partition,
            settings,
            graph,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Cases one suite would run, in name order
    pub fn select(&self, kind: SuiteKind) -> Vec<&RegisteredCase> {
        let filter = self
            .partition
            .filter(kind)
            .narrowed_by(self.settings.narrowing.iter().cloned());
        self.registry.select(&filter)
    }

    /// Run a task and everything its plan pulls in
    pub fn invoke(&self, task: &str) -> HarnessResult<PipelineOutcome> {
        let plan = self.graph.execution_plan(task)?;
        info!(task, plan = ?plan.order, "invoking task");

        let mut suites = Vec::new();
        let mut coverage = None;
        let mut results_files = Vec::new();

        let report = TaskExecutor::new(&self.graph).run(&plan, |node| match node.name.as_str() {
            UNIT_TEST_TASK => {
                self.suite_task(UNIT_TEST_TASK, SuiteKind::Unit, &mut suites, &mut results_files)
            }
            FUNCTIONAL_TEST_TASK => self.suite_task(
                FUNCTIONAL_TEST_TASK,
                SuiteKind::Functional,
                &mut suites,
                &mut results_files,
            ),
            DEFAULT_TEST_TASK => {
                self.suite_task(DEFAULT_TEST_TASK, SuiteKind::Unit, &mut suites, &mut results_files)
            }
            COVERAGE_REPORT_TASK => {
                let stage = self.generate_coverage_report();
                let outcome = match &stage {
                    CoverageStage::Generated { .. } => TaskOutcome::Succeeded,
                    CoverageStage::Failed { message } => TaskOutcome::Failed(message.clone()),
                };
                coverage = Some(stage);
                outcome
            }
            other => TaskOutcome::Failed(format!("task '{}' has no action", other)),
        })?;

        Ok(PipelineOutcome {
            task: task.to_string(),
            suites,
            coverage,
            results_files,
            report,
        })
    }

    /// Run one suite under a task name
    pub fn run_suite(&self, task: &str, kind: SuiteKind) -> SuiteRun {
        let settings = match kind {
            SuiteKind::Unit => &self.settings.unit,
            SuiteKind::Functional => &self.settings.functional,
        };
        let probe_dir = (task == DEFAULT_TEST_TASK).then(|| self.settings.probe_dir());

        let cases = self.select(kind);
        info!(task, suite = %kind, cases = cases.len(), parallel = settings.parallel, "running suite");

        let runner = TestRunner::new()
            .with_parallel(settings.parallel)
            .with_jobs(settings.jobs)
            .with_timeout(settings.timeout)
            .with_env(settings.env.clone())
            .with_probe_dir(probe_dir);

        let start = Instant::now();
        let runs = runner.run(task, &cases);

        SuiteRun {
            task: task.to_string(),
            kind,
            runs,
            duration: start.elapsed(),
        }
    }

    fn suite_task(
        &self,
        task: &str,
        kind: SuiteKind,
        suites: &mut Vec<SuiteRun>,
        results_files: &mut Vec<PathBuf>,
    ) -> TaskOutcome {
        let suite = self.run_suite(task, kind);
        let mut problems = Vec::new();

        if self.settings.junit {
            match junit::write(&self.settings.output_dir, &suite, Utc::now()) {
                Ok(path) => results_files.push(path),
                Err(e) => problems.push(format!("cannot write test results: {}", e)),
            }
        }

        if task == DEFAULT_TEST_TASK {
            let data = ExecutionData::merge(
                task,
                suite.total(),
                suite.runs.iter().flat_map(|r| r.probes.iter().cloned()),
            );
            if let Err(e) = data.write(&self.settings.execution_data_path()) {
                problems.push(format!("cannot write coverage execution data: {}", e));
            }
        }

        let outcome = if !suite.is_success() {
            TaskOutcome::Failed(format!(
                "{} of {} tests failed",
                suite.failed(),
                suite.total()
            ))
        } else if !problems.is_empty() {
            TaskOutcome::Failed(problems.join("; "))
        } else {
            TaskOutcome::Succeeded
        };
        for problem in &problems {
            warn!(task, %problem, "suite task problem");
        }

        suites.push(suite);
        outcome
    }

    /// Render the coverage report from the execution data of `test`
    pub fn generate_coverage_report(&self) -> CoverageStage {
        match self.try_generate_coverage_report() {
            Ok(stage) => stage,
            Err(e) => {
                warn!(error = %e, "coverage report failed");
                CoverageStage::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    fn try_generate_coverage_report(&self) -> HarnessResult<CoverageStage> {
        let data = ExecutionData::read(&self.settings.execution_data_path())?;
        let report = CoverageReport::from_execution_data(
            format!("{} - coverage", self.settings.project_name),
            &data,
        );
        let report_dir = self.settings.coverage_report_dir();
        let files = report.write(&report_dir, &self.settings.coverage.formats)?;

        if let Some(minimum) = self.settings.coverage.minimum_line_ratio {
            report.verify(minimum)?;
        }

        Ok(CoverageStage::Generated {
            summary: report.summary,
            report_dir,
            files,
        })
    }
}
