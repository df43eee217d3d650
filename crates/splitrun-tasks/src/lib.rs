//! Task graph for splitrun
//!
//! Models the small build-tool style pipeline that sits around test suites:
//! - Tasks with `depends_on` edges (must succeed first)
//! - Tasks with `finalized_by` edges (always run afterwards, even on failure)
//! - Deterministic execution planning with cycle detection
//! - An executor that applies the skip/finalizer rules while running actions

pub mod error;
pub mod executor;
pub mod graph;

pub use error::{TaskError, TaskResult};
pub use executor::{ExecutionReport, TaskExecutor, TaskOutcome, TaskRecord, TaskStatus};
pub use graph::{ExecutionPlan, TaskGraph, TaskNode};
