//! Task executor - run an execution plan with finalizer semantics

use crate::error::{TaskError, TaskResult};
use crate::graph::{ExecutionPlan, TaskGraph, TaskNode};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a task action reports back to the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The action did its work
    Succeeded,
    /// The action ran and failed
    Failed(String),
    /// The action decided there was nothing to do
    Skipped(String),
}

/// Final status of a task in an execution report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed(String),
    /// The action ran but had nothing to do
    Skipped(String),
    /// The executor never invoked the action
    NotRun(String),
}

impl TaskStatus {
    /// Whether dependents may rely on this task
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Skipped(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }

    /// Whether the action was invoked
    pub fn ran(&self) -> bool {
        !matches!(self, TaskStatus::NotRun(_))
    }
}

impl From<TaskOutcome> for TaskStatus {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Succeeded => TaskStatus::Succeeded,
            TaskOutcome::Failed(message) => TaskStatus::Failed(message),
            TaskOutcome::Skipped(reason) => TaskStatus::Skipped(reason),
        }
    }
}

/// A task after execution
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub name: String,
    pub status: TaskStatus,
    pub duration: Duration,
}

/// Records for every task of a plan, in plan order
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub records: Vec<TaskRecord>,
}

impl ExecutionReport {
    /// True when no task failed and every task was executed
    pub fn is_success(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status.is_success())
    }

    /// Look up the record of a task
    pub fn get(&self, name: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Whether the action of a task was invoked
    pub fn ran(&self, name: &str) -> bool {
        self.get(name).map(|r| r.status.ran()).unwrap_or(false)
    }

    /// Names of failed tasks
    pub fn failed_tasks(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status.is_failure())
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Runs the tasks of a plan in order
///
/// A task runs when all of its dependencies succeeded and no earlier task
/// failed. A finalizer of a task that ran is the exception: it runs as soon
/// as its dependencies have run, whatever their outcome.
pub struct TaskExecutor<'g> {
    graph: &'g TaskGraph,
}

impl<'g> TaskExecutor<'g> {
    /// Create an executor over a graph
    pub fn new(graph: &'g TaskGraph) -> Self {
        Self { graph }
    }

    /// Plan and run a single target
    pub fn run_target<F>(&self, target: &str, action: F) -> TaskResult<ExecutionReport>
    where
        F: FnMut(&TaskNode) -> TaskOutcome,
    {
        let plan = self.graph.execution_plan(target)?;
        self.run(&plan, action)
    }

    /// Run every task of a plan
    pub fn run<F>(&self, plan: &ExecutionPlan, mut action: F) -> TaskResult<ExecutionReport>
    where
        F: FnMut(&TaskNode) -> TaskOutcome,
    {
        let mut statuses: HashMap<&str, TaskStatus> = HashMap::new();
        let mut report = ExecutionReport::default();
        let mut stopped = false;

        for name in &plan.order {
            let task = self
                .graph
                .get_task(name)
                .ok_or_else(|| TaskError::task_not_found(name))?;

            let finalizes_ran_task = self
                .graph
                .finalized_tasks(name)
                .iter()
                .any(|t| statuses.get(t).map(TaskStatus::ran).unwrap_or(false));

            let blocked = if finalizes_ran_task {
                task.depends_on
                    .iter()
                    .find(|d| !statuses.get(d.as_str()).map(TaskStatus::ran).unwrap_or(false))
                    .map(|d| format!("dependency '{}' did not run", d))
            } else if let Some(dep) = task
                .depends_on
                .iter()
                .find(|d| !statuses.get(d.as_str()).map(TaskStatus::is_success).unwrap_or(false))
            {
                Some(format!("dependency '{}' did not succeed", dep))
            } else if stopped {
                Some("execution stopped after an earlier failure".to_string())
            } else {
                None
            };

            let (status, duration) = match blocked {
                Some(reason) => {
                    debug!(task = %name, %reason, "task not run");
                    (TaskStatus::NotRun(reason), Duration::ZERO)
                }
                None => {
                    info!(task = %name, "running task");
                    let start = Instant::now();
                    let status = TaskStatus::from(action(task));
                    let elapsed = start.elapsed();
                    if let TaskStatus::Failed(message) = &status {
                        warn!(task = %name, %message, "task failed");
                        stopped = true;
                    }
                    (status, elapsed)
                }
            };

            statuses.insert(name.as_str(), status.clone());
            report.records.push(TaskRecord {
                name: name.clone(),
                status,
                duration,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskNode;

    fn suite_graph() -> TaskGraph {
        let mut graph = TaskGraph::new();
        graph
            .add_task(TaskNode::new("test").finalized_by("coverageReport"))
            .unwrap();
        graph
            .add_task(TaskNode::new("coverageReport").depends_on("test"))
            .unwrap();
        graph.add_task(TaskNode::new("unitTest")).unwrap();
        graph
    }

    #[test]
    fn test_finalizer_runs_after_success() {
        let graph = suite_graph();
        let mut ran = Vec::new();
        let report = TaskExecutor::new(&graph)
            .run_target("test", |task| {
                ran.push(task.name.clone());
                TaskOutcome::Succeeded
            })
            .unwrap();

        assert_eq!(ran, vec!["test", "coverageReport"]);
        assert!(report.is_success());
    }

    #[test]
    fn test_finalizer_runs_after_failure() {
        let graph = suite_graph();
        let mut ran = Vec::new();
        let report = TaskExecutor::new(&graph)
            .run_target("test", |task| {
                ran.push(task.name.clone());
                if task.name == "test" {
                    TaskOutcome::Failed("1 test failed".to_string())
                } else {
                    TaskOutcome::Succeeded
                }
            })
            .unwrap();

        assert_eq!(ran, vec!["test", "coverageReport"]);
        assert!(!report.is_success());
        assert_eq!(report.failed_tasks(), vec!["test"]);
        assert_eq!(
            report.get("coverageReport").unwrap().status,
            TaskStatus::Succeeded
        );
    }

    #[test]
    fn test_dependent_not_run_after_failure() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskNode::new("compile")).unwrap();
        graph
            .add_task(TaskNode::new("package").depends_on("compile"))
            .unwrap();

        let report = TaskExecutor::new(&graph)
            .run_target("package", |task| {
                if task.name == "compile" {
                    TaskOutcome::Failed("boom".to_string())
                } else {
                    TaskOutcome::Succeeded
                }
            })
            .unwrap();

        assert!(!report.ran("package"));
        match &report.get("package").unwrap().status {
            TaskStatus::NotRun(reason) => assert!(reason.contains("compile")),
            other => panic!("Expected NotRun, got {:?}", other),
        }
    }

    #[test]
    fn test_finalizer_of_unexecuted_task_not_run() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskNode::new("setup")).unwrap();
        graph
            .add_task(
                TaskNode::new("test")
                    .depends_on("setup")
                    .finalized_by("report"),
            )
            .unwrap();
        graph.add_task(TaskNode::new("report")).unwrap();

        let report = TaskExecutor::new(&graph)
            .run_target("test", |task| {
                if task.name == "setup" {
                    TaskOutcome::Failed("no database".to_string())
                } else {
                    TaskOutcome::Succeeded
                }
            })
            .unwrap();

        assert!(report.ran("setup"));
        assert!(!report.ran("test"));
        assert!(!report.ran("report"));
    }

    #[test]
    fn test_skipped_action_counts_as_success_for_dependents() {
        let mut graph = TaskGraph::new();
        graph.add_task(TaskNode::new("a")).unwrap();
        graph.add_task(TaskNode::new("b").depends_on("a")).unwrap();

        let report = TaskExecutor::new(&graph)
            .run_target("b", |task| {
                if task.name == "a" {
                    TaskOutcome::Skipped("up to date".to_string())
                } else {
                    TaskOutcome::Succeeded
                }
            })
            .unwrap();

        assert!(report.ran("b"));
        assert!(report.is_success());
    }

    #[test]
    fn test_unknown_target_is_error() {
        let graph = suite_graph();
        let result = TaskExecutor::new(&graph).run_target("missing", |_| TaskOutcome::Succeeded);
        assert!(matches!(result, Err(TaskError::TaskNotFound { .. })));
    }

    #[test]
    fn test_status_helpers() {
        assert!(TaskStatus::Succeeded.is_success());
        assert!(TaskStatus::Skipped("x".into()).is_success());
        assert!(!TaskStatus::Failed("x".into()).is_success());
        assert!(TaskStatus::Failed("x".into()).ran());
        assert!(!TaskStatus::NotRun("x".into()).ran());
    }
}
