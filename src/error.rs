use std::time::Duration;

use thiserror::Error;

use crate::agent::AgentId;
use crate::core::task::TaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid override pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Request is ambiguous: structural confidence {confidence:.2} is below {threshold:.2}"
    )]
    AmbiguousDecomposition { confidence: f64, threshold: f64 },

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error("Agent not registered: {0}")]
    UnknownAgent(AgentId),

    #[error("No capable agent for capability '{capability}' (best score {best_score:.2})")]
    NoCapableAgent { capability: String, best_score: f64 },

    #[error(transparent)]
    AgentExecution(#[from] AgentExecutionError),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Worker pool is full (max {max})")]
    PoolFull { max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by an [`AgentExecutor`](crate::orchestration::AgentExecutor).
///
/// Transient errors are retried by the coordinator with backoff; permanent
/// ones fail the task on the first occurrence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("agent execution failed: {message}")]
pub struct AgentExecutionError {
    pub message: String,
    pub retryable: bool,
}

impl AgentExecutionError {
    /// A transient failure that the coordinator may retry.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that retrying cannot fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}
