//! JUnit XML results, one file per suite run

use crate::error::{HarnessError, HarnessResult};
use crate::pattern::simple_name;
use crate::runner::TestResult;
use crate::suite::SuiteRun;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Location of the results file of a task below the output directory
pub fn results_path(output_dir: &Path, task: &str) -> PathBuf {
    output_dir
        .join("test-results")
        .join(task)
        .join(format!("TEST-{}.xml", task))
}

/// Render a suite run as a JUnit `<testsuite>` document
pub fn render(suite: &SuiteRun, timestamp: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<testsuite name="{}" tests="{}" failures="{}" errors="0" skipped="0" time="{:.3}" timestamp="{}">"#,
        xml_escape(&suite.task),
        suite.total(),
        suite.failed(),
        suite.duration.as_secs_f64(),
        timestamp.format("%Y-%m-%dT%H:%M:%S")
    );

    for run in &suite.runs {
        let open = format!(
            r#"  <testcase name="{}" classname="{}" time="{:.3}""#,
            xml_escape(simple_name(&run.name)),
            xml_escape(&run.name),
            run.result.duration().as_secs_f64()
        );
        match &run.result {
            TestResult::Pass { .. } => {
                let _ = writeln!(out, "{}/>", open);
            }
            TestResult::Fail { error, .. } => {
                let first_line = error.lines().next().unwrap_or_default();
                let _ = writeln!(out, "{}>", open);
                let _ = writeln!(
                    out,
                    r#"    <failure message="{}" type="failure">{}</failure>"#,
                    xml_escape(first_line),
                    xml_escape(error)
                );
                let _ = writeln!(out, "  </testcase>");
            }
            TestResult::Timeout { duration } => {
                let _ = writeln!(out, "{}>", open);
                let _ = writeln!(
                    out,
                    r#"    <failure message="timed out after {:.2?}" type="timeout"/>"#,
                    duration
                );
                let _ = writeln!(out, "  </testcase>");
            }
        }
    }

    let _ = writeln!(out, "</testsuite>");
    out
}

/// Write the results of a suite run, returning the file written
pub fn write(output_dir: &Path, suite: &SuiteRun, timestamp: DateTime<Utc>) -> HarnessResult<PathBuf> {
    let path = results_path(output_dir, &suite.task);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
    }
    fs::write(&path, render(suite, timestamp)).map_err(|e| HarnessError::io(&path, e))?;
    Ok(path)
}

/// Escape text for attributes and character data
///
/// Control characters other than tab, newline and carriage return are not
/// allowed in XML 1.0 and are dropped.
fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < ' ' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TestRun;
    use crate::suite::SuiteKind;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::tempdir;

    fn suite() -> SuiteRun {
        SuiteRun {
            task: "unitTest".to_string(),
            kind: SuiteKind::Unit,
            runs: vec![
                TestRun {
                    name: "com.shop.LoginTest".to_string(),
                    file: None,
                    result: TestResult::Pass {
                        duration: Duration::from_millis(12),
                    },
                    probes: Vec::new(),
                },
                TestRun {
                    name: "com.shop.CartTest".to_string(),
                    file: None,
                    result: TestResult::Fail {
                        error: "expected <1> but was <2>\nat CartTest.java:14".to_string(),
                        duration: Duration::from_millis(5),
                    },
                    probes: Vec::new(),
                },
            ],
            duration: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_render_junit() {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        insta::assert_snapshot!(render(&suite(), timestamp).trim_end(), @r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <testsuite name="unitTest" tests="2" failures="1" errors="0" skipped="0" time="0.020" timestamp="2026-03-01T12:00:00">
          <testcase name="LoginTest" classname="com.shop.LoginTest" time="0.012"/>
          <testcase name="CartTest" classname="com.shop.CartTest" time="0.005">
            <failure message="expected &lt;1&gt; but was &lt;2&gt;" type="failure">expected &lt;1&gt; but was &lt;2&gt;
        at CartTest.java:14</failure>
          </testcase>
        </testsuite>
        "#);
    }

    #[test]
    fn test_empty_suite_still_written() {
        let dir = tempdir().unwrap();
        let empty = SuiteRun {
            task: "functionalTest".to_string(),
            kind: SuiteKind::Functional,
            runs: Vec::new(),
            duration: Duration::ZERO,
        };

        let path = write(dir.path(), &empty, Utc::now()).unwrap();

        assert_eq!(
            path,
            dir.path().join("test-results/functionalTest/TEST-functionalTest.xml")
        );
        let xml = fs::read_to_string(path).unwrap();
        assert!(xml.contains(r#"tests="0" failures="0""#));
    }

    #[test]
    fn test_control_characters_dropped_from_failure() {
        let mut colored = suite();
        colored.runs[1].result = TestResult::Fail {
            error: "\u{1b}[31mexpected true\u{1b}[0m\r\n\tat CartTest".to_string(),
            duration: Duration::ZERO,
        };

        let xml = render(&colored, Utc::now());

        assert!(xml
            .chars()
            .all(|c| c >= ' ' || matches!(c, '\t' | '\n' | '\r')));
        assert!(xml.contains(r#"message="[31mexpected true[0m""#));
        assert!(xml.contains("\r\n\tat CartTest"));
    }
}
