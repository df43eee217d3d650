//! Integration tests for the splitrun binary
//!
//! Each test writes a throwaway project whose cases are small `sh`
//! commands, then drives the binary the way a CI job would.

#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

const PASS: &str = "exit 0";
const FAIL: &str = "echo 'assertion failed' >&2; exit 1";

/// Create a project declaring one command case per (name, script)
fn create_project(cases: &[(&str, &str)], extra: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut toml = String::from("[project]\nname = \"shop\"\n\n");
    toml.push_str(extra);
    toml.push('\n');
    for (name, script) in cases {
        toml.push_str(&format!(
            "[[cases]]\nname = \"{}\"\ncommand = [\"sh\", \"-c\", {:?}]\n\n",
            name, script
        ));
    }
    fs::write(dir.path().join("splitrun.toml"), toml).unwrap();
    dir
}

/// The binary, isolated from the user's home and environment
fn splitrun(project: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("splitrun");
    cmd.current_dir(project)
        .env("HOME", project)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SPLITRUN_JSON")
        .env_remove("SPLITRUN_OUTPUT_DIR")
        .env_remove("SPLITRUN_JOBS")
        .env_remove("SPLITRUN_PARALLEL")
        .env_remove("SPLITRUN_FUNCTIONAL_PATTERN");
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

fn case_names(suite: &Value) -> Vec<String> {
    suite["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Default task
// ============================================================================

#[test]
fn test_default_task_runs_unit_suite_and_coverage() {
    let project = create_project(
        &[("LoginTest", PASS), ("LoginFunctionalTest", FAIL)],
        "",
    );

    splitrun(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Task :test"))
        .stdout(predicate::str::contains("Task :coverageReport"))
        .stdout(predicate::str::contains("BUILD SUCCESSFUL"));

    let root = project.path().join("build/splitrun");
    assert!(root.join("test-results/test/TEST-test.xml").exists());
    assert!(root.join("reports/coverage/test/index.html").exists());
    assert!(root.join("reports/coverage/test/coverage.json").exists());
    assert!(root.join("reports/coverage/test/coverage.csv").exists());
}

#[test]
fn test_failing_case_exits_nonzero_after_coverage() {
    let project = create_project(&[("LoginTest", FAIL), ("CartTest", PASS)], "");

    splitrun(project.path())
        .arg("test")
        .arg("--verbose")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL LoginTest"))
        .stdout(predicate::str::contains("PASS CartTest"))
        .stdout(predicate::str::contains("assertion failed"))
        .stdout(predicate::str::contains("Task :coverageReport"))
        .stdout(predicate::str::contains("BUILD FAILED"));

    assert!(project
        .path()
        .join("build/splitrun/reports/coverage/test/index.html")
        .exists());
}

#[test]
fn test_only_functional_cases_default_task_succeeds() {
    let project = create_project(&[("FooFunctionalTest", FAIL)], "");

    let value = json_output(&mut splitrun(project.path()));
    assert_eq!(value["exit_code"], 0);
    assert_eq!(value["suites"][0]["tests"], 0);
    assert_eq!(value["coverage"]["success"], true);
}

// ============================================================================
// Suite tasks
// ============================================================================

#[test]
fn test_suites_partition_cases() {
    let project = create_project(
        &[
            ("LoginTest", PASS),
            ("LoginFunctionalTest", PASS),
            ("CheckoutFunctionalTest", PASS),
            ("FunctionalTestHelper", PASS),
        ],
        "",
    );

    let unit = json_output(splitrun(project.path()).arg("unitTest"));
    let functional = json_output(splitrun(project.path()).arg("functionalTest"));

    assert_eq!(
        case_names(&unit["suites"][0]),
        vec!["FunctionalTestHelper", "LoginTest"]
    );
    assert_eq!(
        case_names(&functional["suites"][0]),
        vec!["CheckoutFunctionalTest", "LoginFunctionalTest"]
    );
    assert!(unit["coverage"].is_null());
    assert!(functional["coverage"].is_null());
}

#[test]
fn test_kebab_case_alias() {
    let project = create_project(&[("LoginFunctionalTest", FAIL)], "");

    splitrun(project.path())
        .arg("functional-test")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Task :functionalTest"));
}

#[test]
fn test_tests_flag_narrows_suite() {
    let project = create_project(
        &[("LoginTest", PASS), ("CartTest", FAIL), ("CartFunctionalTest", PASS)],
        "",
    );

    let value = json_output(
        splitrun(project.path())
            .arg("unitTest")
            .args(["--tests", "Login*"]),
    );
    assert_eq!(case_names(&value["suites"][0]), vec!["LoginTest"]);
    assert_eq!(value["exit_code"], 0);
}

#[test]
fn test_custom_functional_pattern() {
    let project = create_project(
        &[("LoginTest", PASS), ("LoginIT", PASS)],
        "[suites]\nfunctional_pattern = \"*IT\"\n",
    );

    let value = json_output(splitrun(project.path()).arg("functionalTest"));
    assert_eq!(case_names(&value["suites"][0]), vec!["LoginIT"]);
}

#[test]
fn test_case_environment() {
    let project = create_project(
        &[(
            "EnvTest",
            "test \"$SPLITRUN_CASE\" = EnvTest && test \"$SPLITRUN_SUITE\" = unitTest && test \"$REGION\" = eu",
        )],
        "[suites.unit]\nenv = { REGION = \"eu\" }\n",
    );

    splitrun(project.path()).arg("unitTest").assert().success();
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn test_coverage_from_probe_files() {
    let project = create_project(
        &[(
            "LoginTest",
            r#"printf '{"unit":"shop.Login","line":3}\n{"unit":"shop.Login","line":4,"hits":0}\n' > "$SPLITRUN_COVERAGE_OUT""#,
        )],
        "",
    );

    let value = json_output(&mut splitrun(project.path()));
    assert_eq!(value["coverage"]["units"], 1);
    assert_eq!(value["coverage"]["lines_total"], 2);
    assert_eq!(value["coverage"]["lines_covered"], 1);
}

#[test]
fn test_coverage_minimum_exit_code() {
    let project = create_project(
        &[(
            "LoginTest",
            r#"printf '{"unit":"shop.Login","line":3,"hits":0}\n' > "$SPLITRUN_COVERAGE_OUT""#,
        )],
        "[coverage]\nminimum_line_ratio = 0.8\n",
    );

    splitrun(project.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("coverage report failed"));
}

#[test]
fn test_coverage_report_task_runs_test_first() {
    let project = create_project(&[("LoginTest", PASS)], "");

    let value = json_output(splitrun(project.path()).arg("coverageReport"));
    let tasks: Vec<&str> = value["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tasks, vec!["test", "coverageReport"]);
    assert_eq!(value["exit_code"], 0);
}

// ============================================================================
// Other commands
// ============================================================================

#[test]
fn test_list_shows_suites() {
    let project = create_project(&[("LoginTest", PASS), ("LoginFunctionalTest", PASS)], "");

    splitrun(project.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("unit        LoginTest"))
        .stdout(predicate::str::contains("functional  LoginFunctionalTest"));

    splitrun(project.path())
        .args(["list", "--suite", "functional"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LoginFunctionalTest"))
        .stdout(predicate::str::contains("LoginTest").not());
}

#[test]
fn test_discovered_sources_use_runner_template() {
    let project = create_project(&[], "[runner]\ncommand = [\"sh\", \"-c\", \"test {simple} = LoginTest\"]\n");
    let src = project.path().join("src/test/shop");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("LoginTest.java"), "").unwrap();
    fs::write(src.join("Helper.java"), "").unwrap();

    let value = json_output(splitrun(project.path()).arg("unitTest"));
    assert_eq!(case_names(&value["suites"][0]), vec!["shop.LoginTest"]);
    assert_eq!(value["exit_code"], 0);
}

#[test]
fn test_tasks_command() {
    let project = create_project(&[], "");

    splitrun(project.path())
        .arg("tasks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Verification tasks"))
        .stdout(predicate::str::contains("finalized by: coverageReport"));
}

#[test]
fn test_completions() {
    let project = create_project(&[], "");

    splitrun(project.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("splitrun"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("splitrun.toml"), "[runner]\njobs = 0\n").unwrap();

    splitrun(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("splitrun.toml"), "[runner]\nthreads = 4\n").unwrap();

    splitrun(dir.path()).assert().failure();
}
