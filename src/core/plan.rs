//! Validated set of assignments for one session.

use crate::core::dag::TaskDAG;
use crate::core::task::{Assignment, PlannedTask, TaskDelegation, TaskId};
use crate::error::Result;
use serde::Serialize;

/// The delegation engine's output: one [`Assignment`] per planned task.
///
/// Construction checks that ids are unique, every dependency refers to a
/// task in the plan, and the dependency relation is acyclic, so a plan
/// that exists can always be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegationPlan {
    assignments: Vec<Assignment>,
}

impl DelegationPlan {
    pub fn new(assignments: Vec<Assignment>) -> Result<Self> {
        TaskDAG::from_assignments(&assignments)?;
        Ok(Self { assignments })
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Build the dependency graph for this plan.
    pub fn dag(&self) -> Result<TaskDAG> {
        TaskDAG::from_assignments(&self.assignments)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task_id() == *id)
    }

    pub fn delegations(&self) -> impl Iterator<Item = &TaskDelegation> {
        self.assignments.iter().filter_map(Assignment::delegation)
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &PlannedTask> {
        self.assignments.iter().filter_map(|a| match a {
            Assignment::Unassignable { task, .. } => Some(task),
            Assignment::Delegated(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
