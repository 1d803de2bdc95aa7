//! Folds per-task results into one orchestration result.

use crate::core::plan::DelegationPlan;
use crate::core::request::DelegationRequest;
use crate::core::session::{OrchestrationResult, SessionId};
use crate::core::task::{TaskId, TaskResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

/// Merges task outcomes into an [`OrchestrationResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Build the session result.
    ///
    /// `started` is the instant decomposition began; wall time is measured
    /// from it to the end of this call.
    pub fn aggregate(
        &self,
        session_id: SessionId,
        request: &DelegationRequest,
        plan: &DelegationPlan,
        results: Vec<TaskResult>,
        started: Instant,
        started_at: DateTime<Utc>,
    ) -> OrchestrationResult {
        let overall_confidence = overall_confidence(plan, &results);
        let success = !plan.is_empty()
            && plan.len() == results.len()
            && results.iter().all(TaskResult::success);

        let delegations = plan.delegations().cloned().collect();
        let unassigned = plan.unassigned().cloned().collect();
        let total_execution_time_ms = started.elapsed().as_millis() as u64;

        info!(
            session_id = %session_id,
            tasks = plan.len(),
            succeeded = results.iter().filter(|r| r.success()).count(),
            overall_confidence,
            success,
            elapsed_ms = total_execution_time_ms,
            "Orchestration finished"
        );

        OrchestrationResult::new(
            session_id,
            request.query().to_string(),
            delegations,
            unassigned,
            results,
            overall_confidence,
            success,
            total_execution_time_ms,
            started_at,
        )
    }
}

/// Complexity-weighted mean of achieved confidence.
///
/// Failed and missing results add their weight to the denominator only.
/// An empty plan scores 0.0.
pub fn overall_confidence(plan: &DelegationPlan, results: &[TaskResult]) -> f64 {
    let by_task: HashMap<TaskId, &TaskResult> = results.iter().map(|r| (r.task_id(), r)).collect();

    let (weighted, total_weight) =
        plan.assignments()
            .iter()
            .fold((0.0, 0.0), |(weighted, total), assignment| {
                let weight = assignment.complexity().weight();
                let achieved = by_task
                    .get(&assignment.task_id())
                    .filter(|r| r.success())
                    .and_then(|r| r.confidence_achieved())
                    .map_or(0.0, |c| c.value());
                (weighted + weight * achieved, total + weight)
            });

    if total_weight > 0.0 {
        weighted / total_weight
    } else {
        0.0
    }
}
