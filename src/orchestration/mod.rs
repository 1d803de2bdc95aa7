//! Orchestration layer for multi-agent delegation.
//!
//! This module provides the engines that carry one request through a
//! session: the capability registry, the task decomposer, the delegation
//! engine, the execution coordinator with its worker pool, and the result
//! aggregator. [`Orchestrator`] chains them together.

pub mod aggregator;
pub mod coordinator;
pub mod decomposer;
pub mod delegation;
pub mod executor;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod retry;

pub use aggregator::ResultAggregator;
pub use coordinator::{CoordinatorConfig, CoordinatorEvent, ExecutionCoordinator};
pub use decomposer::{
    Decomposition, TaskDecomposer, DEFAULT_DECOMPOSITION_THRESHOLD, DEFAULT_MAX_SUBTASKS,
    GENERAL_CAPABILITY,
};
pub use delegation::{AgentOverride, DelegationEngine, OverrideSet, DEFAULT_CONFIDENCE_FLOOR};
pub use executor::{
    AgentExecutor, BlockingExecutor, ExecutionOutput, ExecutorRouter, FnExecutor,
};
pub use orchestrator::Orchestrator;
pub use pool::WorkerPool;
pub use registry::CapabilityRegistry;
pub use retry::RetryPolicy;
