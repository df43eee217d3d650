//! Executable test cases
//!
//! A case is anything implementing [`Executable`]. Two kinds ship with the
//! harness: closures registered from Rust code ([`FnCase`]) and external
//! commands built from the runner configuration ([`CommandCase`]).

use crate::coverage::Probe;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Environment variable carrying the case name
pub const ENV_CASE: &str = "SPLITRUN_CASE";
/// Environment variable carrying the suite (task) name
pub const ENV_SUITE: &str = "SPLITRUN_SUITE";
/// Environment variable naming the file a command may write probes to
pub const ENV_COVERAGE_OUT: &str = "SPLITRUN_COVERAGE_OUT";

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const OUTPUT_TAIL_LINES: usize = 20;

/// Why a case did not pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    /// The case ran and reported a failure
    Failed(String),
    /// The case exceeded its time limit and was stopped
    TimedOut(Duration),
}

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseError::Failed(message) => f.write_str(message),
            CaseError::TimedOut(limit) => write!(f, "timed out after {:.2?}", limit),
        }
    }
}

impl std::error::Error for CaseError {}

impl CaseError {
    pub fn failed(message: impl Into<String>) -> Self {
        CaseError::Failed(message.into())
    }
}

/// Per-run state handed to a case
#[derive(Debug, Clone, Default)]
pub struct CaseContext {
    name: String,
    suite: String,
    timeout: Option<Duration>,
    env: BTreeMap<String, String>,
    coverage_out: Option<PathBuf>,
    probes: Vec<Probe>,
}

impl CaseContext {
    pub fn new(name: impl Into<String>, suite: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suite: suite.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_coverage_out(mut self, path: Option<PathBuf>) -> Self {
        self.coverage_out = path;
        self
    }

    /// Fully-qualified case name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task the case runs under (`unitTest`, `functionalTest`, `test`)
    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Extra environment configured for the suite
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// File external processes may append probes to
    pub fn coverage_out(&self) -> Option<&Path> {
        self.coverage_out.as_deref()
    }

    /// Record that a line of a unit executed
    pub fn record(&mut self, unit: impl Into<String>, line: u32) {
        self.probes.push(Probe::new(unit, line, 1));
    }

    /// Record a probe as-is, including instrumented lines that never ran
    pub fn record_probe(&mut self, probe: Probe) {
        self.probes.push(probe);
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub(crate) fn take_probes(&mut self) -> Vec<Probe> {
        std::mem::take(&mut self.probes)
    }
}

/// Something the runner can execute as a test case
pub trait Executable: Send + Sync {
    fn execute(&self, ctx: &mut CaseContext) -> Result<(), CaseError>;
}

/// A case backed by a closure
pub struct FnCase<F>(F);

impl<F> FnCase<F>
where
    F: Fn(&mut CaseContext) -> Result<(), CaseError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Executable for FnCase<F>
where
    F: Fn(&mut CaseContext) -> Result<(), CaseError> + Send + Sync,
{
    fn execute(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        (self.0)(ctx)
    }
}

/// A case backed by an external command
///
/// The command passes when it exits with status 0. It receives
/// `SPLITRUN_CASE`, `SPLITRUN_SUITE`, the suite environment and, when the
/// runner collects coverage, `SPLITRUN_COVERAGE_OUT` naming a file it may
/// fill with JSON-lines probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCase {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandCase {
    /// Build from an argv; `None` when it has no program
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: None,
        })
    }

    /// Build from an argv template
    ///
    /// `{name}`, `{simple}` and `{file}` are replaced in every argument.
    pub fn from_template(template: &[String], name: &str, file: Option<&Path>) -> Option<Self> {
        let simple = crate::pattern::simple_name(name);
        let file = file.map(|f| f.display().to_string()).unwrap_or_default();
        let argv: Vec<String> = template
            .iter()
            .map(|arg| {
                arg.replace("{name}", name)
                    .replace("{simple}", simple)
                    .replace("{file}", &file)
            })
            .collect();
        Self::from_argv(&argv)
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command line for display
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_probes(&self, ctx: &mut CaseContext) {
        let Some(path) = ctx.coverage_out().map(Path::to_path_buf) else {
            return;
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(case = ctx.name(), path = %path.display(), error = %e, "cannot read coverage probes");
                return;
            }
        };
        match Probe::parse_lines(&content) {
            Ok(probes) => probes.into_iter().for_each(|p| ctx.record_probe(p)),
            Err(e) => {
                warn!(case = ctx.name(), path = %path.display(), error = %e, "ignoring malformed coverage probes")
            }
        }
    }
}

impl Executable for CommandCase {
    fn execute(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(ctx.env())
            .env(ENV_CASE, ctx.name())
            .env(ENV_SUITE, ctx.suite())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        if let Some(path) = ctx.coverage_out() {
            command.env(ENV_COVERAGE_OUT, path);
        }

        debug!(case = ctx.name(), command = %self.display(), "spawning");
        let mut child = command
            .spawn()
            .map_err(|e| CaseError::failed(format!("Failed to start '{}': {}", self.program, e)))?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(CaseError::failed(format!("Failed to wait for process: {}", e)));
                }
            }
            if let Some(limit) = ctx.timeout() {
                if start.elapsed() >= limit {
                    terminate(&mut child);
                    return Err(CaseError::TimedOut(limit));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.map(join_reader).unwrap_or_default();
        let stderr = stderr.map(join_reader).unwrap_or_default();

        self.collect_probes(ctx);

        if status.success() {
            return Ok(());
        }

        let mut message = match status.code() {
            Some(code) => format!("Process exited with status {}", code),
            None => "Process terminated by signal".to_string(),
        };
        for (label, output) in [("stderr", &stderr), ("stdout", &stdout)] {
            let tail = output_tail(output, OUTPUT_TAIL_LINES);
            if !tail.is_empty() {
                message.push_str(&format!("\n--- {} ---\n{}", label, tail));
            }
        }
        Err(CaseError::Failed(message))
    }
}

/// Kill a child and reap it so no zombie is left behind
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Last `max` non-empty lines of process output
fn output_tail(output: &str, max: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(max);
    lines[skip..].join("\n")
}
