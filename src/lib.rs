//! Multi-agent task delegation and orchestration.
//!
//! A request is decomposed into dependent subtasks, each subtask is
//! delegated to the best-scoring registered agent, the resulting graph is
//! executed with bounded concurrency, and the outcomes are folded into one
//! confidence-weighted [`OrchestrationResult`].

pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod orchestration;
pub mod telemetry;
pub mod util;

pub use agent::{AgentCapability, AgentId, AgentProfile};
pub use config::Config;
pub use crate::core::{
    Assignment, Complexity, ComplexityRange, Confidence, Constraints, DelegationPlan,
    DelegationRequest, FailureReason, OrchestrationResult, PlannedTask, SessionId,
    TaskDelegation, TaskId, TaskResult, TaskStatus,
};
pub use error::{AgentExecutionError, Error, Result};
pub use orchestration::{
    AgentExecutor, AgentOverride, BlockingExecutor, CapabilityRegistry, CoordinatorConfig,
    CoordinatorEvent, DelegationEngine, ExecutionCoordinator, ExecutionOutput, ExecutorRouter,
    FnExecutor, Orchestrator, OverrideSet, ResultAggregator, RetryPolicy, TaskDecomposer,
};
