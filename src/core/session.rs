//! Session identity and the aggregated orchestration result.

use crate::core::task::{FailureReason, PlannedTask, TaskDelegation, TaskId, TaskResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one orchestration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single result handed back to the caller when a session ends.
///
/// Built once by the aggregator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    session_id: SessionId,
    query: String,
    delegations: Vec<TaskDelegation>,
    unassigned: Vec<PlannedTask>,
    results: Vec<TaskResult>,
    overall_confidence: f64,
    success: bool,
    total_execution_time_ms: u64,
    started_at: DateTime<Utc>,
}

impl OrchestrationResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session_id: SessionId,
        query: String,
        delegations: Vec<TaskDelegation>,
        unassigned: Vec<PlannedTask>,
        results: Vec<TaskResult>,
        overall_confidence: f64,
        success: bool,
        total_execution_time_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            query,
            delegations,
            unassigned,
            results,
            overall_confidence,
            success,
            total_execution_time_ms,
            started_at,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Tasks that were bound to an agent.
    pub fn delegations(&self) -> &[TaskDelegation] {
        &self.delegations
    }

    /// Tasks no agent qualified for.
    pub fn unassigned(&self) -> &[PlannedTask] {
        &self.unassigned
    }

    /// One result per decomposed task, in dependency order.
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn overall_confidence(&self) -> f64 {
        self.overall_confidence
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn total_execution_time_ms(&self) -> u64 {
        self.total_execution_time_ms
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn result_for(&self, task_id: &TaskId) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_id() == *task_id)
    }

    /// Failed tasks and why they failed.
    pub fn failures(&self) -> Vec<(TaskId, &FailureReason)> {
        self.results
            .iter()
            .filter_map(|r| r.failure().map(|reason| (r.task_id(), reason)))
            .collect()
    }

    /// Serialize for the session sink.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
