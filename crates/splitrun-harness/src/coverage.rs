//! Coverage execution data and report generation
//!
//! Cases record line probes while they run. The default suite persists the
//! merged probes as execution data; the coverage stage reads that file back
//! and renders the report in the configured formats.

use crate::error::{HarnessError, HarnessResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splitrun_config::CoverageFormat;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One recorded line of a covered unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Unit under test (class, module or file)
    pub unit: String,
    pub line: u32,
    /// Times the line executed; zero marks an instrumented line that never ran
    #[serde(default = "default_hits")]
    pub hits: u64,
}

fn default_hits() -> u64 {
    1
}

impl Probe {
    pub fn new(unit: impl Into<String>, line: u32, hits: u64) -> Self {
        Self {
            unit: unit.into(),
            line,
            hits,
        }
    }

    /// Parse probes written one JSON object per line
    ///
    /// Blank lines are ignored; the line number of the first malformed entry
    /// is reported in the error.
    pub fn parse_lines(content: &str) -> Result<Vec<Probe>, String> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| format!("line {}: {}", idx + 1, e))
            })
            .collect()
    }
}

/// Execution data handed from the default suite to the coverage stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    /// Task that recorded the data
    pub task: String,
    pub recorded_at: DateTime<Utc>,
    /// Number of cases that ran
    pub cases: usize,
    /// Merged probes, sorted by unit then line
    pub probes: Vec<Probe>,
}

impl ExecutionData {
    /// Merge probes from many cases, summing hits per unit and line
    pub fn merge(task: &str, cases: usize, probes: impl IntoIterator<Item = Probe>) -> Self {
        let mut merged: BTreeMap<(String, u32), u64> = BTreeMap::new();
        for probe in probes {
            let hits = merged.entry((probe.unit, probe.line)).or_insert(0);
            *hits = hits.saturating_add(probe.hits);
        }

        Self {
            task: task.to_string(),
            recorded_at: Utc::now(),
            cases,
            probes: merged
                .into_iter()
                .map(|((unit, line), hits)| Probe { unit, line, hits })
                .collect(),
        }
    }

    /// Write the data, replacing any earlier file
    pub fn write(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
        }
        // A failed write must not leave data from an earlier run behind
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(HarnessError::io(path, e)),
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| HarnessError::io(path, e))?;
        debug!(path = %path.display(), probes = self.probes.len(), "execution data written");
        Ok(())
    }

    /// Read data written by [`ExecutionData::write`]
    pub fn read(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::MissingExecutionData(path.to_path_buf())
            } else {
                HarnessError::io(path, e)
            }
        })?;
        serde_json::from_str(&content).map_err(|source| HarnessError::CorruptExecutionData {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Line coverage of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitCoverage {
    pub unit: String,
    pub lines_total: usize,
    pub lines_covered: usize,
    /// Hits per line
    pub lines: BTreeMap<u32, u64>,
}

impl UnitCoverage {
    pub fn line_ratio(&self) -> f64 {
        ratio(self.lines_covered, self.lines_total)
    }
}

/// Totals over a whole report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub units: usize,
    pub lines_total: usize,
    pub lines_covered: usize,
}

impl CoverageSummary {
    /// Covered-line ratio; `None` when no line was instrumented
    pub fn line_ratio(&self) -> Option<f64> {
        (self.lines_total > 0).then(|| ratio(self.lines_covered, self.lines_total))
    }

    /// Console summary line
    pub fn describe(&self) -> String {
        match self.line_ratio() {
            Some(r) => format!(
                "Coverage: {:.1}% lines ({}/{}) across {} unit{}",
                r * 100.0,
                self.lines_covered,
                self.lines_total,
                self.units,
                if self.units == 1 { "" } else { "s" }
            ),
            None => "Coverage: no coverage data recorded".to_string(),
        }
    }
}

fn ratio(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64
    }
}

/// A rendered coverage report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub summary: CoverageSummary,
    pub units: Vec<UnitCoverage>,
}

impl CoverageReport {
    /// Build a report from execution data
    pub fn from_execution_data(title: impl Into<String>, data: &ExecutionData) -> Self {
        let mut per_unit: BTreeMap<&str, BTreeMap<u32, u64>> = BTreeMap::new();
        for probe in &data.probes {
            let hits = per_unit
                .entry(probe.unit.as_str())
                .or_default()
                .entry(probe.line)
                .or_insert(0);
            *hits = hits.saturating_add(probe.hits);
        }

        let units: Vec<UnitCoverage> = per_unit
            .into_iter()
            .map(|(unit, lines)| UnitCoverage {
                unit: unit.to_string(),
                lines_total: lines.len(),
                lines_covered: lines.values().filter(|hits| **hits > 0).count(),
                lines,
            })
            .collect();

        let summary = CoverageSummary {
            units: units.len(),
            lines_total: units.iter().map(|u| u.lines_total).sum(),
            lines_covered: units.iter().map(|u| u.lines_covered).sum(),
        };

        Self {
            title: title.into(),
            generated_at: Utc::now(),
            summary,
            units,
        }
    }

    /// Fail when the covered-line ratio is below `minimum`
    ///
    /// A report without instrumented lines is not checked.
    pub fn verify(&self, minimum: f64) -> HarnessResult<()> {
        match self.summary.line_ratio() {
            Some(actual) if actual < minimum => Err(HarnessError::CoverageBelowMinimum {
                actual: actual * 100.0,
                minimum: minimum * 100.0,
            }),
            _ => Ok(()),
        }
    }

    /// Write the report into `dir` in every requested format
    pub fn write(&self, dir: &Path, formats: &[CoverageFormat]) -> HarnessResult<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| HarnessError::io(dir, e))?;

        let mut written = Vec::with_capacity(formats.len());
        for format in formats {
            let (file, content) = match format {
                CoverageFormat::Html => ("index.html", self.to_html()),
                CoverageFormat::Json => ("coverage.json", serde_json::to_string_pretty(self)?),
                CoverageFormat::Csv => ("coverage.csv", self.to_csv()),
            };
            let path = dir.join(file);
            fs::write(&path, content).map_err(|e| HarnessError::io(&path, e))?;
            written.push(path);
        }

        info!(dir = %dir.display(), files = written.len(), "coverage report written");
        Ok(written)
    }

    /// One row per unit
    pub fn to_csv(&self) -> String {
        let mut out = String::from("unit,lines_total,lines_covered,lines_missed,line_ratio\n");
        for unit in &self.units {
            let _ = writeln!(
                out,
                "{},{},{},{},{:.4}",
                csv_field(&unit.unit),
                unit.lines_total,
                unit.lines_covered,
                unit.lines_total - unit.lines_covered,
                unit.line_ratio()
            );
        }
        out
    }

    pub fn to_html(&self) -> String {
        let title = html_escape(&self.title);
        let mut out = String::new();
        let _ = writeln!(out, "<!DOCTYPE html>");
        let _ = writeln!(out, "<html lang=\"en\">");
        let _ = writeln!(out, "<head><meta charset=\"utf-8\"><title>{}</title></head>", title);
        let _ = writeln!(out, "<body>");
        let _ = writeln!(out, "<h1>{}</h1>", title);
        let _ = writeln!(
            out,
            "<p>{} &middot; generated {}</p>",
            html_escape(&self.summary.describe()),
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "<table>");
        let _ = writeln!(
            out,
            "<thead><tr><th>Unit</th><th>Lines</th><th>Covered</th><th>Missed</th><th>Coverage</th></tr></thead>"
        );
        let _ = writeln!(out, "<tbody>");
        for unit in &self.units {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
                html_escape(&unit.unit),
                unit.lines_total,
                unit.lines_covered,
                unit.lines_total - unit.lines_covered,
                unit.line_ratio() * 100.0
            );
        }
        let _ = writeln!(out, "</tbody>");
        let _ = writeln!(out, "</table>");
        let _ = writeln!(out, "</body>");
        let _ = writeln!(out, "</html>");
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_data() -> ExecutionData {
        ExecutionData::merge(
            "test",
            2,
            vec![
                Probe::new("auth.Login", 10, 1),
                Probe::new("auth.Login", 11, 0),
                Probe::new("auth.Login", 10, 2),
                Probe::new("cart.Cart", 3, 1),
            ],
        )
    }

    #[test]
    fn test_merge_sums_hits() {
        let data = sample_data();
        assert_eq!(
            data.probes,
            vec![
                Probe::new("auth.Login", 10, 3),
                Probe::new("auth.Login", 11, 0),
                Probe::new("cart.Cart", 3, 1),
            ]
        );
    }

    #[test]
    fn test_hit_counts_saturate() {
        let huge = vec![
            Probe::new("shop.Cart", 1, u64::MAX),
            Probe::new("shop.Cart", 1, 1),
        ];

        let data = ExecutionData::merge("test", 2, huge.clone());
        assert_eq!(data.probes, vec![Probe::new("shop.Cart", 1, u64::MAX)]);

        let unmerged = ExecutionData {
            probes: huge,
            ..data
        };
        let report = CoverageReport::from_execution_data("shop", &unmerged);
        assert_eq!(report.summary.lines_total, 1);
        assert_eq!(report.summary.lines_covered, 1);
        assert_eq!(report.units[0].lines[&1], u64::MAX);
    }

    #[test]
    fn test_report_totals() {
        let report = CoverageReport::from_execution_data("shop", &sample_data());
        assert_eq!(report.summary.units, 2);
        assert_eq!(report.summary.lines_total, 3);
        assert_eq!(report.summary.lines_covered, 2);
        assert_eq!(
            report.summary.describe(),
            "Coverage: 66.7% lines (2/3) across 2 units"
        );
    }

    #[test]
    fn test_empty_report() {
        let data = ExecutionData::merge("test", 0, Vec::new());
        let report = CoverageReport::from_execution_data("shop", &data);
        assert_eq!(report.summary.line_ratio(), None);
        assert!(report.verify(0.9).is_ok());
        assert_eq!(report.summary.describe(), "Coverage: no coverage data recorded");
    }

    #[test]
    fn test_verify_minimum() {
        let report = CoverageReport::from_execution_data("shop", &sample_data());
        assert!(report.verify(0.5).is_ok());
        assert!(matches!(
            report.verify(0.8),
            Err(HarnessError::CoverageBelowMinimum { .. })
        ));
    }

    #[test]
    fn test_execution_data_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage").join("test.exec.json");
        let data = sample_data();

        data.write(&path).unwrap();
        assert_eq!(ExecutionData::read(&path).unwrap(), data);
    }

    #[test]
    fn test_missing_and_corrupt_execution_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.exec.json");
        assert!(matches!(
            ExecutionData::read(&path),
            Err(HarnessError::MissingExecutionData(_))
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ExecutionData::read(&path),
            Err(HarnessError::CorruptExecutionData { .. })
        ));
    }

    #[test]
    fn test_write_all_formats() {
        let dir = tempdir().unwrap();
        let report = CoverageReport::from_execution_data("shop", &sample_data());
        let files = report.write(dir.path(), CoverageFormat::ALL).unwrap();

        assert_eq!(files.len(), 3);
        assert!(dir.path().join("index.html").exists());
        let csv = fs::read_to_string(dir.path().join("coverage.csv")).unwrap();
        insta::assert_snapshot!(csv.trim_end(), @r"
        unit,lines_total,lines_covered,lines_missed,line_ratio
        auth.Login,2,1,1,0.5000
        cart.Cart,1,1,0,1.0000
        ");
    }

    #[test]
    fn test_html_escapes_unit_names() {
        let data = ExecutionData::merge("test", 1, vec![Probe::new("<script>", 1, 1)]);
        let html = CoverageReport::from_execution_data("a & b", &data).to_html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<title>a &amp; b</title>"));
    }

    #[test]
    fn test_parse_probe_lines() {
        let content = "{\"unit\":\"a.B\",\"line\":4,\"hits\":2}\n\n{\"unit\":\"a.B\",\"line\":5}\n";
        let probes = Probe::parse_lines(content).unwrap();
        assert_eq!(probes, vec![Probe::new("a.B", 4, 2), Probe::new("a.B", 5, 1)]);

        let err = Probe::parse_lines("{\"unit\":\"a.B\"}\nnot json").unwrap_err();
        assert!(err.starts_with("line 1"));
    }
}
