//! Suite partitioning and suite results
//!
//! The functional pattern splits the registry in two: cases matching it
//! form the functional suite, every other case belongs to the unit suite.
//! The default `test` run uses the unit selection.

use crate::error::HarnessResult;
use crate::pattern::{NamePattern, TestFilter};
use crate::runner::TestRun;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Pattern marking functional cases when nothing else is configured
pub const DEFAULT_FUNCTIONAL_PATTERN: &str = "*FunctionalTest";

/// The two halves of the partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    Unit,
    Functional,
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteKind::Unit => f.write_str("unit"),
            SuiteKind::Functional => f.write_str("functional"),
        }
    }
}

/// Splits case names into unit and functional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    functional: NamePattern,
}

impl Default for Partition {
    fn default() -> Self {
        Self {
            functional: NamePattern::trusted(DEFAULT_FUNCTIONAL_PATTERN),
        }
    }
}

impl Partition {
    /// Partition by a custom functional pattern
    pub fn new(functional_pattern: &str) -> HarnessResult<Self> {
        Ok(Self {
            functional: NamePattern::new(functional_pattern)?,
        })
    }

    pub fn functional_pattern(&self) -> &NamePattern {
        &self.functional
    }

    /// Which suite a case belongs to
    pub fn classify(&self, name: &str) -> SuiteKind {
        if self.functional.matches(name) {
            SuiteKind::Functional
        } else {
            SuiteKind::Unit
        }
    }

    /// Selection of one half of the partition
    pub fn filter(&self, kind: SuiteKind) -> TestFilter {
        match kind {
            SuiteKind::Unit => TestFilter::all().exclude(self.functional.clone()),
            SuiteKind::Functional => TestFilter::all().include(self.functional.clone()),
        }
    }
}

/// Results of running one suite
#[derive(Debug, Clone)]
pub struct SuiteRun {
    /// Task that ran the suite (`unitTest`, `functionalTest`, `test`)
    pub task: String,
    pub kind: SuiteKind,
    pub runs: Vec<TestRun>,
    /// Wall-clock time of the whole suite
    pub duration: Duration,
}

impl SuiteRun {
    pub fn total(&self) -> usize {
        self.runs.len()
    }

    pub fn passed(&self) -> usize {
        self.runs.iter().filter(|r| r.result.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.result.is_fail()).count()
    }

    /// An empty suite is a success
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Names of the cases that ran
    pub fn case_names(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.name.as_str()).collect()
    }

    /// Plain summary line
    pub fn summary_line(&self) -> String {
        format!(
            "Test result: {} | {} total, {} passed, {} failed",
            if self.is_success() { "PASSED" } else { "FAILED" },
            self.total(),
            self.passed(),
            self.failed()
        )
    }
}
