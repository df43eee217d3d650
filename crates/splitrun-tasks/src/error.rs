/// Task graph error types
use thiserror::Error;

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {task}")]
    TaskNotFound { task: String },

    #[error("Task '{task}' refers to unknown task '{reference}'")]
    UnknownReference { task: String, reference: String },

    #[error("Task '{task}' is registered twice")]
    DuplicateTask { task: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Invalid task definition: {0}")]
    InvalidTask(String),
}

impl TaskError {
    /// Create a task not found error
    pub fn task_not_found(task: impl Into<String>) -> Self {
        Self::TaskNotFound { task: task.into() }
    }

    /// Create an unknown reference error
    pub fn unknown_reference(task: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnknownReference {
            task: task.into(),
            reference: reference.into(),
        }
    }
}
