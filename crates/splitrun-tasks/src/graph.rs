//! Task graph and execution planning using topological sort
use crate::error::{TaskError, TaskResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A task in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    /// Task name (e.g. "unitTest")
    pub name: String,
    /// Human readable description
    pub description: Option<String>,
    /// Task group (e.g. "verification")
    pub group: Option<String>,
    /// Tasks that must succeed before this one runs
    pub depends_on: Vec<String>,
    /// Tasks that always run after this one, whether it failed or not
    pub finalized_by: Vec<String>,
}

impl TaskNode {
    /// Create a new task node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            group: None,
            depends_on: Vec::new(),
            finalized_by: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Add a dependency
    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    /// Add a finalizer
    pub fn finalized_by(mut self, task: impl Into<String>) -> Self {
        self.finalized_by.push(task.into());
        self
    }
}

/// Ordered list of tasks to execute for a set of requested targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Tasks the caller asked for
    pub targets: Vec<String>,
    /// Every task to execute, in order
    pub order: Vec<String>,
}

impl ExecutionPlan {
    /// Check whether the plan includes a task
    pub fn contains(&self, task: &str) -> bool {
        self.order.iter().any(|t| t == task)
    }

    /// Position of a task in the plan
    pub fn position(&self, task: &str) -> Option<usize> {
        self.order.iter().position(|t| t == task)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Graph of named tasks linked by `depends_on` and `finalized_by` edges
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: HashMap<String, TaskNode>,
}

impl TaskGraph {
    /// Create a new empty task graph
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Add a task to the graph
    pub fn add_task(&mut self, task: TaskNode) -> TaskResult<()> {
        if task.name.is_empty() {
            return Err(TaskError::InvalidTask("task name is empty".to_string()));
        }
        if self.tasks.contains_key(&task.name) {
            return Err(TaskError::DuplicateTask { task: task.name });
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Get a task by name
    pub fn get_task(&self, name: &str) -> Option<&TaskNode> {
        self.tasks.get(name)
    }

    /// All tasks sorted by group, then by name
    pub fn tasks_sorted(&self) -> Vec<&TaskNode> {
        let mut tasks: Vec<&TaskNode> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks that name `finalizer` in their `finalized_by` list
    pub fn finalized_tasks(&self, finalizer: &str) -> Vec<&str> {
        let mut finalized: Vec<&str> = self
            .tasks
            .values()
            .filter(|t| t.finalized_by.iter().any(|f| f == finalizer))
            .map(|t| t.name.as_str())
            .collect();
        finalized.sort_unstable();
        finalized
    }

    /// Validate that every edge points at a registered task
    pub fn validate(&self) -> TaskResult<()> {
        for (name, task) in &self.tasks {
            for reference in task.depends_on.iter().chain(task.finalized_by.iter()) {
                if !self.tasks.contains_key(reference) {
                    return Err(TaskError::unknown_reference(name, reference));
                }
            }
        }
        Ok(())
    }

    /// Plan the execution of a single task
    pub fn execution_plan(&self, target: &str) -> TaskResult<ExecutionPlan> {
        self.execution_plan_for(&[target])
    }

    /// Plan the execution of several requested tasks
    ///
    /// The plan holds the targets, the transitive closure of their
    /// dependencies and the finalizers of everything selected. Dependencies
    /// come before their dependents and finalizers come after the tasks they
    /// finalize. Ties are broken by name so plans are deterministic.
    pub fn execution_plan_for(&self, targets: &[&str]) -> TaskResult<ExecutionPlan> {
        self.validate()?;

        for target in targets {
            if !self.tasks.contains_key(*target) {
                return Err(TaskError::task_not_found(*target));
            }
        }

        let selected = self.select_closure(targets);
        let edges = self.edges_within(&selected);

        let mut in_degree: BTreeMap<&str, usize> =
            selected.iter().map(|name| (name.as_str(), 0)).collect();
        let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for &(from, to) in &edges {
            successors.entry(from).or_default().push(to);
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }

        // Kahn's algorithm with a sorted ready set
        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(selected.len());

        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            if let Some(next) = successors.get(name) {
                for &successor in next {
                    if let Some(degree) = in_degree.get_mut(successor) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(successor);
                        }
                    }
                }
            }
        }

        if order.len() != selected.len() {
            let cycle = find_cycle(&successors);
            return Err(TaskError::CircularDependency(cycle));
        }

        Ok(ExecutionPlan {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            order,
        })
    }

    /// Targets plus everything reachable through either edge kind
    fn select_closure(&self, targets: &[&str]) -> BTreeSet<String> {
        let mut selected = BTreeSet::new();
        let mut pending: Vec<String> = targets.iter().map(|t| t.to_string()).collect();

        while let Some(name) = pending.pop() {
            if !selected.insert(name.clone()) {
                continue;
            }
            if let Some(task) = self.tasks.get(&name) {
                pending.extend(task.depends_on.iter().cloned());
                pending.extend(task.finalized_by.iter().cloned());
            }
        }

        selected
    }

    /// Ordering edges (before, after) among the selected tasks
    fn edges_within<'a>(&'a self, selected: &'a BTreeSet<String>) -> BTreeSet<(&'a str, &'a str)> {
        let mut edges = BTreeSet::new();
        for name in selected {
            if let Some(task) = self.tasks.get(name) {
                for dep in &task.depends_on {
                    edges.insert((dep.as_str(), name.as_str()));
                }
                for finalizer in &task.finalized_by {
                    edges.insert((name.as_str(), finalizer.as_str()));
                }
            }
        }
        edges
    }
}

/// Find a cycle in the ordering edges (for error reporting)
fn find_cycle(successors: &BTreeMap<&str, Vec<&str>>) -> String {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for name in successors.keys() {
        if let Some(cycle) = dfs_find_cycle(*name, successors, &mut visited, &mut rec_stack, &mut path)
        {
            return cycle;
        }
    }

    "unknown cycle".to_string()
}

fn dfs_find_cycle<'a>(
    name: &'a str,
    successors: &BTreeMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<String> {
    if rec_stack.contains(name) {
        path.push(name);
        if let Some(start) = path.iter().position(|t| *t == name) {
            return Some(path[start..].join(" -> "));
        }
        return Some(path.join(" -> "));
    }

    if !visited.insert(name) {
        return None;
    }

    rec_stack.insert(name);
    path.push(name);

    if let Some(next) = successors.get(name) {
        for successor in next {
            if let Some(cycle) = dfs_find_cycle(*successor, successors, visited, rec_stack, path) {
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(name);
    path.pop();
    None
}
