use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::list::SuiteChoice;
use splitrun_harness::{
    COVERAGE_REPORT_TASK, DEFAULT_TEST_TASK, FUNCTIONAL_TEST_TASK, UNIT_TEST_TASK,
};

/// Run unit and functional test suites split by case name.
///
/// Cases whose name ends in `FunctionalTest` form the functional suite,
/// every other case belongs to the unit suite. The default `test` task runs
/// the unit suite and is always followed by a coverage report, even when a
/// case failed.
///
/// EXAMPLES:
///     splitrun                       Run `test` (unit suite + coverage)
///     splitrun unitTest              Run the unit suite only
///     splitrun functionalTest        Run the functional suite only
///     splitrun coverageReport        Run `test`, then render coverage
///     splitrun test --tests 'Login*' Narrow the suite to matching cases
///     splitrun list --suite unit     Show the cases of the unit suite
///
/// ENVIRONMENT VARIABLES:
///     SPLITRUN_JSON                 Set to '1' for JSON output by default
///     SPLITRUN_OUTPUT_DIR           Override the output directory
///     SPLITRUN_JOBS                 Override the number of parallel jobs
///     SPLITRUN_PARALLEL             Run cases in parallel (true/false)
///     SPLITRUN_FUNCTIONAL_PATTERN   Override the functional case pattern
///     NO_COLOR                      Set to disable colored output
///     RUST_LOG                      Log filter (overrides -v)
#[derive(Parser)]
#[command(name = "splitrun")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug, Clone, Default)]
struct GlobalArgs {
    /// Directory to search for splitrun.toml from (defaults to current directory)
    #[arg(long, short = 'd', global = true, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Use a specific project configuration file
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show each case and more logging (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Print results as JSON
    #[arg(long, global = true, env = "SPLITRUN_JSON")]
    json: bool,

    /// Run cases one at a time
    #[arg(long, global = true)]
    sequential: bool,

    /// Maximum number of cases running at once
    #[arg(long, short = 'j', global = true, value_name = "N")]
    jobs: Option<usize>,

    /// Only run cases matching this pattern (repeatable)
    #[arg(long = "tests", global = true, value_name = "PATTERN")]
    tests: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the unit suite
    ///
    /// Runs every case that does not match the functional pattern.
    ///
    /// EXAMPLES:
    ///     splitrun unitTest
    ///     splitrun unit-test --tests 'com.shop.*'
    #[command(name = "unitTest", visible_alias = "unit-test")]
    UnitTest,

    /// Run the functional suite
    ///
    /// Runs every case matching the functional pattern (`*FunctionalTest`
    /// unless configured otherwise). Cases run one at a time by default.
    ///
    /// EXAMPLES:
    ///     splitrun functionalTest
    ///     splitrun functional-test --json
    #[command(name = "functionalTest", visible_alias = "functional-test")]
    FunctionalTest,

    /// Run the unit suite and generate the coverage report (default)
    ///
    /// The coverage report runs after the suite whether or not a case failed.
    /// The exit status is non-zero when a case failed.
    #[command(name = "test")]
    Test,

    /// Generate the coverage report for the test task
    ///
    /// Runs `test` first, since the report is built from its execution data.
    ///
    /// EXAMPLES:
    ///     splitrun coverageReport
    #[command(name = "coverageReport", visible_alias = "coverage-report")]
    CoverageReport,

    /// List cases and the suite each belongs to
    ///
    /// EXAMPLES:
    ///     splitrun list
    ///     splitrun list --suite functional
    #[command(visible_alias = "ls")]
    List {
        /// Which suite to list
        #[arg(long, short = 's', value_enum, default_value_t = SuiteChoice::All)]
        suite: SuiteChoice,
    },

    /// Show the available tasks and how they depend on each other
    Tasks,

    /// Generate shell completions
    ///
    /// Outputs shell completion script for the specified shell.
    ///
    /// INSTALLATION:
    ///     Bash: splitrun completions bash > /etc/bash_completion.d/splitrun
    ///     Zsh:  splitrun completions zsh > ~/.zfunc/_splitrun
    ///     Fish: splitrun completions fish > ~/.config/fish/completions/splitrun.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Install the log subscriber
///
/// Priority: RUST_LOG > -v count > warnings only. Logs go to stderr so the
/// report on stdout stays clean.
fn init_tracing(verbose: u8, no_color: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(!no_color)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.no_color);

    let options = commands::GlobalOptions {
        dir: cli.global.dir,
        config: cli.global.config,
        verbose: cli.global.verbose > 0,
        no_color: cli.global.no_color,
        json: cli.global.json,
        sequential: cli.global.sequential,
        jobs: cli.global.jobs,
        tests: cli.global.tests,
    };

    let task = match cli.command.unwrap_or(Commands::Test) {
        Commands::UnitTest => UNIT_TEST_TASK,
        Commands::FunctionalTest => FUNCTIONAL_TEST_TASK,
        Commands::Test => DEFAULT_TEST_TASK,
        Commands::CoverageReport => COVERAGE_REPORT_TASK,
        Commands::List { suite } => return commands::list::run(&options, suite),
        Commands::Tasks => return commands::tasks::run(&options),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
    };

    let code = commands::run::run(&options, task)?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
