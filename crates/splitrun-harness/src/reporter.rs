//! Test reporter - display suite and coverage results

use crate::pipeline::CoverageStage;
use crate::runner::{TestResult, TestRun};
use crate::suite::SuiteRun;
use colored::*;
use std::io::{self, Write};

/// Test reporter with output configuration
pub struct TestReporter {
    /// Show detailed output for each case
    verbose: bool,
    /// Disable colored output
    no_color: bool,
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TestReporter {
    /// Create a new test reporter
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Report a suite run on stdout
    pub fn print_suite(&self, suite: &SuiteRun) {
        let stdout = io::stdout();
        let _ = self.report_suite(&mut stdout.lock(), suite);
    }

    /// Report the coverage stage on stdout
    pub fn print_coverage(&self, stage: &CoverageStage) {
        let stdout = io::stdout();
        let _ = self.report_coverage(&mut stdout.lock(), stage);
    }

    /// Report a suite run
    pub fn report_suite(&self, out: &mut dyn Write, suite: &SuiteRun) -> io::Result<()> {
        self.with_colors(|| {
            writeln!(out, "{} {}", ">".dimmed(), format!("Task :{}", suite.task).bold())?;

            if suite.runs.is_empty() {
                writeln!(out, "{}", "No tests found.".yellow())?;
                writeln!(out)?;
                return Ok(());
            }

            for run in &suite.runs {
                self.print_test_result(out, run)?;
            }

            // Dots need a newline before the summary
            if !self.verbose {
                writeln!(out)?;
            }

            writeln!(out)?;
            self.print_summary(out, suite)?;
            self.print_failures(out, &suite.runs)?;
            writeln!(out)
        })
    }

    /// Report the outcome of the coverage stage
    pub fn report_coverage(&self, out: &mut dyn Write, stage: &CoverageStage) -> io::Result<()> {
        self.with_colors(|| {
            writeln!(out, "{} {}", ">".dimmed(), "Task :coverageReport".bold())?;
            match stage {
                CoverageStage::Generated {
                    summary,
                    report_dir,
                    ..
                } => {
                    writeln!(out, "{}", summary.describe())?;
                    writeln!(out, "Report: {}", report_dir.display().to_string().dimmed())?;
                }
                CoverageStage::Failed { message } => {
                    writeln!(
                        out,
                        "{} {}",
                        "coverage report failed:".red().bold(),
                        message
                    )?;
                }
            }
            writeln!(out)
        })
    }

    fn with_colors<F>(&self, f: F) -> io::Result<()>
    where
        F: FnOnce() -> io::Result<()>,
    {
        if self.no_color {
            colored::control::set_override(false);
        }
        let result = f();
        if self.no_color {
            colored::control::unset_override();
        }
        result
    }

    /// Print a single case result
    fn print_test_result(&self, out: &mut dyn Write, run: &TestRun) -> io::Result<()> {
        match &run.result {
            TestResult::Pass { duration } => {
                if self.verbose {
                    writeln!(out, "{} {} ({:.2?})", "PASS".green().bold(), run.name, duration)
                } else {
                    write!(out, "{}", ".".green())?;
                    out.flush()
                }
            }
            TestResult::Fail { duration, .. } => {
                if self.verbose {
                    writeln!(out, "{} {} ({:.2?})", "FAIL".red().bold(), run.name, duration)
                } else {
                    write!(out, "{}", "F".red().bold())?;
                    out.flush()
                }
            }
            TestResult::Timeout { duration } => {
                if self.verbose {
                    writeln!(
                        out,
                        "{} {} (timeout after {:.2?})",
                        "TIMEOUT".yellow().bold(),
                        run.name,
                        duration
                    )
                } else {
                    write!(out, "{}", "T".yellow().bold())?;
                    out.flush()
                }
            }
        }
    }

    /// Print summary statistics
    fn print_summary(&self, out: &mut dyn Write, suite: &SuiteRun) -> io::Result<()> {
        let failed = suite.failed();

        writeln!(out, "{}", "─".repeat(50))?;

        let status = if failed > 0 {
            "FAILED".red().bold()
        } else {
            "PASSED".green().bold()
        };

        writeln!(
            out,
            "Test result: {} | {} total, {} passed, {} failed",
            status,
            suite.total().to_string().bold(),
            suite.passed().to_string().green().bold(),
            if failed > 0 {
                failed.to_string().red().bold()
            } else {
                failed.to_string().normal()
            }
        )?;
        writeln!(out, "Time: {:.2?}", suite.duration)
    }

    /// Print details of failed cases
    fn print_failures(&self, out: &mut dyn Write, runs: &[TestRun]) -> io::Result<()> {
        let failures: Vec<_> = runs.iter().filter(|r| r.result.is_fail()).collect();

        if failures.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "{}", "Failures:".red().bold())?;
        writeln!(out)?;

        for run in failures {
            write!(out, "  {} {}", "●".red(), run.name.bold())?;
            match &run.file {
                Some(file) => writeln!(out, " ({})", file.display())?,
                None => writeln!(out)?,
            }

            if let TestResult::Fail { error, .. } = &run.result {
                for line in error.lines() {
                    writeln!(out, "      {}", line.dimmed())?;
                }
            } else if let TestResult::Timeout { duration } = &run.result {
                writeln!(out, "      {} after {:.2?}", "Timed out".yellow(), duration)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageSummary;
    use crate::suite::SuiteKind;
    use std::path::PathBuf;
    use std::time::Duration;

    fn make_pass(name: &str) -> TestRun {
        TestRun {
            name: name.to_string(),
            file: Some(PathBuf::from("src/test/LoginTest.java")),
            result: TestResult::Pass {
                duration: Duration::from_millis(10),
            },
            probes: Vec::new(),
        }
    }

    fn make_fail(name: &str, error: &str) -> TestRun {
        TestRun {
            name: name.to_string(),
            file: None,
            result: TestResult::Fail {
                error: error.to_string(),
                duration: Duration::from_millis(5),
            },
            probes: Vec::new(),
        }
    }

    fn suite(runs: Vec<TestRun>) -> SuiteRun {
        SuiteRun {
            task: "unitTest".to_string(),
            kind: SuiteKind::Unit,
            runs,
            duration: Duration::from_millis(15),
        }
    }

    fn render(reporter: &TestReporter, suite: &SuiteRun) -> String {
        let mut buf = Vec::new();
        reporter.report_suite(&mut buf, suite).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_reporter_all_pass() {
        let reporter = TestReporter::new(true).with_no_color(true);
        let output = render(&reporter, &suite(vec![make_pass("LoginTest"), make_pass("CartTest")]));

        assert!(output.contains("Task :unitTest"));
        assert!(output.contains("PASS"));
        assert!(output.contains("PASSED"));
        assert!(!output.contains("Failures:"));
    }

    #[test]
    fn test_reporter_with_failures() {
        let reporter = TestReporter::new(true).with_no_color(true);
        let output = render(
            &reporter,
            &suite(vec![
                make_pass("LoginTest"),
                make_fail("CartTest", "expected 2 items"),
            ]),
        );

        assert!(output.contains("FAILED"));
        assert!(output.contains("Failures:"));
        assert!(output.contains("expected 2 items"));
    }

    #[test]
    fn test_reporter_quiet_mode() {
        let reporter = TestReporter::new(false).with_no_color(true);
        let output = render(&reporter, &suite(vec![make_pass("LoginTest")]));
        assert!(!output.contains("PASS LoginTest"));
        assert!(output.contains("PASSED"));
    }

    #[test]
    fn test_reporter_empty() {
        let reporter = TestReporter::new(true).with_no_color(true);
        let output = render(&reporter, &suite(Vec::new()));
        assert!(output.contains("No tests found."));
    }

    #[test]
    fn test_reporter_coverage() {
        let reporter = TestReporter::new(false).with_no_color(true);
        let mut buf = Vec::new();
        reporter
            .report_coverage(
                &mut buf,
                &CoverageStage::Generated {
                    summary: CoverageSummary {
                        units: 3,
                        lines_total: 12,
                        lines_covered: 10,
                    },
                    report_dir: PathBuf::from("build/splitrun/reports/coverage/test"),
                    files: Vec::new(),
                },
            )
            .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("Coverage: 83.3% lines (10/12) across 3 units"));

        let mut buf = Vec::new();
        reporter
            .report_coverage(
                &mut buf,
                &CoverageStage::Failed {
                    message: "no execution data".to_string(),
                },
            )
            .unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("no execution data"));
    }
}
