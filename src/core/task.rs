//! Task data model for an orchestration session.
//!
//! A request is decomposed into [`PlannedTask`]s, each of which the
//! delegation engine turns into an [`Assignment`]. The coordinator
//! produces exactly one [`TaskResult`] per assignment.

use crate::agent::AgentId;
use crate::core::score::{Complexity, Confidence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task within a session.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Why a task ended in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    /// No registered agent scored above the confidence floor.
    NoCapableAgent,
    /// A (transitive) dependency failed, so the task never ran.
    BlockedByDependency {
        /// The failed task that blocked this one.
        dependency: TaskId,
    },
    /// A single attempt exceeded the per-task timeout.
    Timeout,
    /// The session was cancelled or its deadline elapsed.
    SessionCancelled,
    /// The executor reported an error and the retry budget is spent.
    ExecutionFailed {
        /// Error message from the last attempt.
        message: String,
    },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NoCapableAgent => write!(f, "no capable agent"),
            FailureReason::BlockedByDependency { .. } => {
                write!(f, "blocked by failed dependency")
            }
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::SessionCancelled => write!(f, "session cancelled"),
            FailureReason::ExecutionFailed { message } => {
                write!(f, "execution failed: {}", message)
            }
        }
    }
}

/// Task status in its lifecycle.
///
/// `Pending → Ready → Running → {Succeeded | Failed}`. Unassignable and
/// blocked tasks jump straight from `Pending` to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Waiting on dependencies.
    #[default]
    Pending,
    /// All dependencies succeeded; waiting for a pool slot.
    Ready,
    /// An executor is working on the task.
    Running,
    /// The executor returned output.
    Succeeded,
    /// The task failed or never ran.
    Failed {
        /// Why the task failed.
        reason: FailureReason,
    },
}

impl TaskStatus {
    /// Check if the status is terminal.
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed { .. })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Ready => write!(f, "ready"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// A subtask produced by decomposition, not yet bound to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Short label, e.g. `research-1`.
    pub name: String,
    /// The sub-intent text this task was split from.
    pub description: String,
    /// Capability tag inferred from the description.
    pub capability: String,
    /// Estimated complexity, used for scoring and weighting.
    pub complexity: Complexity,
    /// Tasks that must succeed before this one may start.
    pub dependencies: Vec<TaskId>,
}

impl PlannedTask {
    /// Create a planned task with a fresh identifier.
    pub fn new(
        name: &str,
        description: &str,
        capability: &str,
        complexity: Complexity,
        dependencies: Vec<TaskId>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            description: description.to_string(),
            capability: capability.to_lowercase(),
            complexity,
            dependencies,
        }
    }
}

/// A task bound to the agent selected for it.
///
/// Created by the delegation engine and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDelegation {
    task_id: TaskId,
    name: String,
    description: String,
    capability: String,
    assigned_agent: AgentId,
    confidence: Confidence,
    reasoning: String,
    estimated_complexity: Complexity,
    dependencies: Vec<TaskId>,
}

impl TaskDelegation {
    pub fn new(
        task: &PlannedTask,
        assigned_agent: AgentId,
        confidence: Confidence,
        reasoning: String,
    ) -> Self {
        Self {
            task_id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            capability: task.capability.clone(),
            assigned_agent,
            confidence,
            reasoning,
            estimated_complexity: task.complexity,
            dependencies: task.dependencies.clone(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn assigned_agent(&self) -> &AgentId {
        &self.assigned_agent
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn estimated_complexity(&self) -> Complexity {
        self.estimated_complexity
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }
}

/// Outcome of delegating one planned task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "assignment")]
pub enum Assignment {
    /// An agent was selected.
    Delegated(TaskDelegation),
    /// No agent qualified; the task fails without running.
    Unassignable {
        /// The task that could not be delegated.
        task: PlannedTask,
        /// Human-readable explanation.
        reason: String,
    },
}

impl Assignment {
    pub fn task_id(&self) -> TaskId {
        match self {
            Assignment::Delegated(d) => d.task_id(),
            Assignment::Unassignable { task, .. } => task.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Assignment::Delegated(d) => d.name(),
            Assignment::Unassignable { task, .. } => &task.name,
        }
    }

    pub fn dependencies(&self) -> &[TaskId] {
        match self {
            Assignment::Delegated(d) => d.dependencies(),
            Assignment::Unassignable { task, .. } => &task.dependencies,
        }
    }

    pub fn complexity(&self) -> Complexity {
        match self {
            Assignment::Delegated(d) => d.estimated_complexity(),
            Assignment::Unassignable { task, .. } => task.complexity,
        }
    }

    pub fn delegation(&self) -> Option<&TaskDelegation> {
        match self {
            Assignment::Delegated(d) => Some(d),
            Assignment::Unassignable { .. } => None,
        }
    }
}

/// Final, write-once record of one task's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    task_id: TaskId,
    agent_id: Option<AgentId>,
    success: bool,
    execution_time_secs: f64,
    confidence_achieved: Option<Confidence>,
    output: serde_json::Value,
    failure: Option<FailureReason>,
    started_at: Option<DateTime<Utc>>,
    finished_at: DateTime<Utc>,
    attempts: u32,
}

impl TaskResult {
    /// Record a successful execution.
    pub fn succeeded(
        task_id: TaskId,
        agent_id: AgentId,
        confidence: Confidence,
        output: serde_json::Value,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            task_id,
            agent_id: Some(agent_id),
            success: true,
            execution_time_secs: elapsed_secs(started_at, finished_at),
            confidence_achieved: Some(confidence),
            output,
            failure: None,
            started_at: Some(started_at),
            finished_at,
            attempts,
        }
    }

    /// Record a failure. `started_at` is `None` for tasks that never ran.
    pub fn failed(
        task_id: TaskId,
        agent_id: Option<AgentId>,
        reason: FailureReason,
        started_at: Option<DateTime<Utc>>,
        attempts: u32,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            task_id,
            agent_id,
            success: false,
            execution_time_secs: started_at
                .map(|start| elapsed_secs(start, finished_at))
                .unwrap_or(0.0),
            confidence_achieved: None,
            output: serde_json::Value::Null,
            failure: Some(reason),
            started_at,
            finished_at,
            attempts,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn agent_id(&self) -> Option<&AgentId> {
        self.agent_id.as_ref()
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn execution_time_secs(&self) -> f64 {
        self.execution_time_secs
    }

    pub fn confidence_achieved(&self) -> Option<Confidence> {
        self.confidence_achieved
    }

    pub fn output(&self) -> &serde_json::Value {
        &self.output
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Number of executor invocations (0 if the task never ran).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The terminal status this result represents.
    pub fn status(&self) -> TaskStatus {
        match &self.failure {
            None => TaskStatus::Succeeded,
            Some(reason) => TaskStatus::Failed {
                reason: reason.clone(),
            },
        }
    }
}

fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
