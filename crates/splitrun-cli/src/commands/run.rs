//! Run command - invoke a pipeline task and report what happened

use super::{GlobalOptions, Workspace};
use anyhow::{Context, Result};
use colored::*;
use serde_json::{json, Value};
use splitrun_harness::{CoverageStage, PipelineOutcome, SuiteRun, TestReporter, TestResult};
use splitrun_tasks::TaskStatus;

/// Run a task, returning the process exit status
pub fn run(options: &GlobalOptions, task: &str) -> Result<i32> {
    let workspace = Workspace::load(options)?;
    let no_color = options.colors_disabled(&workspace.config);
    if no_color {
        colored::control::set_override(false);
    }

    if !options.json {
        workspace.print_problems();
    }

    let outcome = workspace
        .pipeline
        .invoke(task)
        .with_context(|| format!("Failed to run task '{}'", task))?;

    if options.json {
        println!("{}", outcome_json(&outcome, &workspace.problems));
    } else {
        let reporter = TestReporter::new(options.verbose).with_no_color(no_color);
        for suite in &outcome.suites {
            reporter.print_suite(suite);
        }
        if let Some(stage) = &outcome.coverage {
            reporter.print_coverage(stage);
        }
        print_build_result(&outcome);
    }

    if no_color {
        colored::control::unset_override();
    }

    Ok(outcome.exit_code())
}

/// Gradle-style closing lines naming every task that did not succeed
fn print_build_result(outcome: &PipelineOutcome) {
    let code = outcome.exit_code();
    if code == 0 {
        println!("{}", "BUILD SUCCESSFUL".green().bold());
        return;
    }

    println!("{}", "BUILD FAILED".red().bold());
    for record in &outcome.report.records {
        match &record.status {
            TaskStatus::Failed(message) => {
                println!("  {} Task :{} failed: {}", "●".red(), record.name, message);
            }
            TaskStatus::NotRun(reason) => {
                println!("  {} Task :{} skipped: {}", "○".dimmed(), record.name, reason.dimmed());
            }
            TaskStatus::Succeeded | TaskStatus::Skipped(_) => {}
        }
    }
}

/// Machine-readable form of an invocation
pub fn outcome_json(outcome: &PipelineOutcome, problems: &[(std::path::PathBuf, String)]) -> Value {
    let suites: Vec<Value> = outcome.suites.iter().map(suite_json).collect();
    let tasks: Vec<Value> = outcome
        .report
        .records
        .iter()
        .map(|record| {
            let (status, message) = match &record.status {
                TaskStatus::Succeeded => ("succeeded", None),
                TaskStatus::Failed(m) => ("failed", Some(m.as_str())),
                TaskStatus::Skipped(m) => ("skipped", Some(m.as_str())),
                TaskStatus::NotRun(m) => ("not-run", Some(m.as_str())),
            };
            json!({
                "name": record.name,
                "status": status,
                "message": message,
                "duration_ms": record.duration.as_millis(),
            })
        })
        .collect();

    let coverage = outcome.coverage.as_ref().map(|stage| match stage {
        CoverageStage::Generated {
            summary,
            report_dir,
            files,
        } => json!({
            "success": true,
            "units": summary.units,
            "lines_total": summary.lines_total,
            "lines_covered": summary.lines_covered,
            "line_ratio": summary.line_ratio(),
            "report_dir": report_dir.display().to_string(),
            "files": files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
        }),
        CoverageStage::Failed { message } => json!({
            "success": false,
            "message": message,
        }),
    });

    json!({
        "task": outcome.task,
        "suites": suites,
        "coverage": coverage,
        "tasks": tasks,
        "results_files": outcome
            .results_files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>(),
        "problems": problems
            .iter()
            .map(|(path, problem)| json!({ "path": path.display().to_string(), "problem": problem }))
            .collect::<Vec<_>>(),
        "exit_code": outcome.exit_code(),
    })
}

fn suite_json(suite: &SuiteRun) -> Value {
    let results: Vec<Value> = suite
        .runs
        .iter()
        .map(|run| {
            let error = match &run.result {
                TestResult::Fail { error, .. } => Some(error.clone()),
                TestResult::Timeout { duration } => Some(format!("timed out after {:.2?}", duration)),
                TestResult::Pass { .. } => None,
            };
            json!({
                "name": run.name,
                "file": run.file.as_ref().map(|f| f.display().to_string()),
                "status": run.result.label(),
                "passed": run.result.is_pass(),
                "duration_ms": run.result.duration().as_millis(),
                "error": error,
            })
        })
        .collect();

    json!({
        "task": suite.task,
        "suite": suite.kind,
        "tests": suite.total(),
        "passed": suite.passed(),
        "failed": suite.failed(),
        "duration_ms": suite.duration.as_millis(),
        "results": results,
    })
}
