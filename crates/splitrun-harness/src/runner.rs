//! Test runner - execute selected cases

use crate::case::{CaseContext, CaseError};
use crate::coverage::Probe;
use crate::registry::RegisteredCase;
use rayon::prelude::*;
use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of running a single case
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    /// Case passed
    Pass { duration: Duration },
    /// Case failed with an error message
    Fail { error: String, duration: Duration },
    /// Case was stopped after exceeding its time limit
    Timeout { duration: Duration },
}

impl TestResult {
    /// Check if this result is a pass
    pub fn is_pass(&self) -> bool {
        matches!(self, TestResult::Pass { .. })
    }

    /// Check if this result is a failure (timeouts included)
    pub fn is_fail(&self) -> bool {
        matches!(self, TestResult::Fail { .. } | TestResult::Timeout { .. })
    }

    /// Get the duration of this case
    pub fn duration(&self) -> Duration {
        match self {
            TestResult::Pass { duration } => *duration,
            TestResult::Fail { duration, .. } => *duration,
            TestResult::Timeout { duration } => *duration,
        }
    }

    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            TestResult::Pass { .. } => "PASS",
            TestResult::Fail { .. } => "FAIL",
            TestResult::Timeout { .. } => "TIMEOUT",
        }
    }
}

/// A completed case run
#[derive(Debug, Clone)]
pub struct TestRun {
    /// Case name
    pub name: String,
    /// Source file, when the case was discovered on disk
    pub file: Option<PathBuf>,
    pub result: TestResult,
    /// Coverage probes recorded while the case ran
    pub probes: Vec<Probe>,
}

/// Test runner with configuration
#[derive(Debug, Clone)]
pub struct TestRunner {
    /// Whether to run cases in parallel
    parallel: bool,
    /// Worker limit for parallel runs
    jobs: Option<usize>,
    /// Time limit for individual cases
    timeout: Option<Duration>,
    /// Extra environment for every case
    env: BTreeMap<String, String>,
    /// Directory command cases write coverage probes into
    probe_dir: Option<PathBuf>,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    /// Create a new test runner with default settings
    pub fn new() -> Self {
        Self {
            parallel: true,
            jobs: None,
            timeout: None,
            env: BTreeMap::new(),
            probe_dir: None,
        }
    }

    /// Set whether to run cases in parallel
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Limit the number of cases running at once
    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the timeout for individual cases
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Collect coverage probes from command cases through files in `dir`
    pub fn with_probe_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.probe_dir = dir;
        self
    }

    /// Run every case under the given suite name
    ///
    /// Results come back in the order of `cases`, whatever the execution order.
    pub fn run(&self, suite: &str, cases: &[&RegisteredCase]) -> Vec<TestRun> {
        if let Some(dir) = &self.probe_dir {
            prepare_probe_dir(dir);
        }

        if self.parallel && cases.len() > 1 {
            self.run_parallel(suite, cases)
        } else {
            self.run_sequential(suite, cases)
        }
    }

    /// Run cases sequentially
    fn run_sequential(&self, suite: &str, cases: &[&RegisteredCase]) -> Vec<TestRun> {
        cases
            .iter()
            .enumerate()
            .map(|(index, case)| self.run_single_case(suite, index, case))
            .collect()
    }

    /// Run cases in parallel using rayon
    fn run_parallel(&self, suite: &str, cases: &[&RegisteredCase]) -> Vec<TestRun> {
        let run_all = || {
            cases
                .par_iter()
                .enumerate()
                .map(|(index, case)| self.run_single_case(suite, index, case))
                .collect::<Vec<_>>()
        };

        match self.jobs {
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(run_all),
                Err(e) => {
                    warn!(error = %e, jobs, "cannot build worker pool, using the global pool");
                    run_all()
                }
            },
            None => run_all(),
        }
    }

    /// Run a single case, `index` being its position in the selection
    fn run_single_case(&self, suite: &str, index: usize, case: &RegisteredCase) -> TestRun {
        let coverage_out = self
            .probe_dir
            .as_ref()
            .map(|dir| dir.join(probe_file_name(index, &case.name)));
        let mut ctx = CaseContext::new(&case.name, suite)
            .with_timeout(self.timeout)
            .with_env(self.env.clone())
            .with_coverage_out(coverage_out);

        debug!(case = %case.name, suite, "running case");
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| case.executable.execute(&mut ctx)));
        let duration = start.elapsed();

        let result = match outcome {
            Ok(Ok(())) => TestResult::Pass { duration },
            Ok(Err(CaseError::Failed(error))) => TestResult::Fail { error, duration },
            Ok(Err(CaseError::TimedOut(_))) => TestResult::Timeout { duration },
            Err(payload) => TestResult::Fail {
                error: format!("panicked: {}", panic_message(payload.as_ref())),
                duration,
            },
        };
        debug!(case = %case.name, status = result.label(), ?duration, "case finished");

        TestRun {
            name: case.name.clone(),
            file: case.file.clone(),
            result,
            probes: ctx.take_probes(),
        }
    }
}

/// Start every run with an empty probe directory
fn prepare_probe_dir(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            warn!(dir = %dir.display(), error = %e, "cannot clear coverage probe directory");
        }
    }
    if let Err(e) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "cannot create coverage probe directory");
    }
}

/// File name unique within a run even when sanitized names coincide
fn probe_file_name(index: usize, case: &str) -> String {
    let safe: String = case
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{:04}-{}.jsonl", index, safe)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
