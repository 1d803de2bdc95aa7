//! Core domain models for delegation and orchestration.
//!
//! This module contains the data structures shared by every stage of a
//! session: planned tasks, delegations, results, the dependency graph,
//! and the bounded confidence/complexity scores.

pub mod dag;
pub mod plan;
pub mod request;
pub mod score;
pub mod session;
pub mod task;

pub use dag::TaskDAG;
pub use plan::DelegationPlan;
pub use request::{Constraints, DelegationRequest};
pub use score::{complexity_fit, peak_fit, Complexity, ComplexityRange, Confidence};
pub use session::{OrchestrationResult, SessionId};
pub use task::{
    Assignment, FailureReason, PlannedTask, TaskDelegation, TaskId, TaskResult, TaskStatus,
};
