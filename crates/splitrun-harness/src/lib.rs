//! Splitrun test harness
//!
//! Splits one set of test cases into a unit and a functional suite by name,
//! runs either suite, and finalizes the default `test` run with a coverage
//! report.
//!
//! # Example
//!
//! ```no_run
//! use splitrun_harness::{Partition, Pipeline, PipelineSettings, TestRegistry, CaseError};
//!
//! let mut registry = TestRegistry::new();
//! registry.register_fn("LoginTest", |_| Ok(())).unwrap();
//! registry
//!     .register_fn("CheckoutFunctionalTest", |_| Err(CaseError::failed("browser missing")))
//!     .unwrap();
//!
//! let pipeline = Pipeline::new(registry, Partition::default(), PipelineSettings::new("build/splitrun"));
//! let outcome = pipeline.invoke("test").unwrap();
//! std::process::exit(outcome.exit_code());
//! ```

pub mod case;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod junit;
pub mod pattern;
pub mod pipeline;
pub mod project;
pub mod registry;
pub mod reporter;
pub mod runner;
pub mod suite;

pub use case::{CaseContext, CaseError, CommandCase, Executable, FnCase};
pub use coverage::{CoverageReport, CoverageSummary, ExecutionData, Probe};
pub use discovery::{DiscoveredCase, Discovery, DiscoveryOptions};
pub use error::{HarnessError, HarnessResult};
pub use pattern::{glob_match, simple_name, NamePattern, TestFilter};
pub use pipeline::{
    CoverageSettings, CoverageStage, Pipeline, PipelineOutcome, PipelineSettings,
    COVERAGE_REPORT_TASK, DEFAULT_TEST_TASK, FUNCTIONAL_TEST_TASK, UNIT_TEST_TASK,
};
pub use project::{load_cases, ProjectCases};
pub use registry::{RegisteredCase, TestRegistry};
pub use reporter::TestReporter;
pub use runner::{TestResult, TestRun, TestRunner};
pub use suite::{Partition, SuiteKind, SuiteRun};
