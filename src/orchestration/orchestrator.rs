//! One orchestration session, end to end.
//!
//! Decomposer → DelegationEngine → ExecutionCoordinator → ResultAggregator.
//! Only request-level problems (an ambiguous request, an invalid task
//! graph) are returned as `Err`; anything that goes wrong after
//! decomposition is embedded in the returned [`OrchestrationResult`].

use crate::config::Config;
use crate::core::request::DelegationRequest;
use crate::core::session::{OrchestrationResult, SessionId};
use crate::error::Result;
use crate::orchestration::aggregator::ResultAggregator;
use crate::orchestration::coordinator::ExecutionCoordinator;
use crate::orchestration::decomposer::TaskDecomposer;
use crate::orchestration::delegation::{DelegationEngine, OverrideSet};
use crate::orchestration::executor::AgentExecutor;
use crate::orchestration::registry::CapabilityRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    decomposer: TaskDecomposer,
    engine: DelegationEngine,
    coordinator: ExecutionCoordinator,
    aggregator: ResultAggregator,
}

impl Orchestrator {
    /// Orchestrator with default thresholds and execution limits.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            decomposer: TaskDecomposer::new(Arc::clone(&registry)),
            engine: DelegationEngine::new(Arc::clone(&registry)),
            coordinator: ExecutionCoordinator::default(),
            aggregator: ResultAggregator::new(),
            registry,
        }
    }

    /// Orchestrator tuned by `config`.
    pub fn from_config(config: &Config, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            decomposer: TaskDecomposer::new(Arc::clone(&registry))
                .with_threshold(config.decomposition.confidence_threshold)
                .with_max_subtasks(config.decomposition.max_subtasks),
            engine: DelegationEngine::new(Arc::clone(&registry))
                .with_floor(config.delegation.confidence_floor),
            coordinator: ExecutionCoordinator::new(config.execution.coordinator_config()),
            aggregator: ResultAggregator::new(),
            registry,
        }
    }

    pub fn with_decomposer(mut self, decomposer: TaskDecomposer) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn with_engine(mut self, engine: DelegationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_coordinator(mut self, coordinator: ExecutionCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Run a session with no external cancellation.
    pub async fn run(
        &self,
        request: &DelegationRequest,
        overrides: &OverrideSet,
        executor: Arc<dyn AgentExecutor>,
    ) -> Result<OrchestrationResult> {
        self.run_with_cancel(request, overrides, executor, CancellationToken::new())
            .await
    }

    /// Run a session that stops early when `cancel` fires.
    ///
    /// The session deadline counts from the start of decomposition.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousDecomposition` or a `Validation` error from the
    /// decomposer, or `DependencyCycle` if the plan cannot be ordered. No
    /// task runs in any of these cases.
    pub async fn run_with_cancel(
        &self,
        request: &DelegationRequest,
        overrides: &OverrideSet,
        executor: Arc<dyn AgentExecutor>,
        cancel: CancellationToken,
    ) -> Result<OrchestrationResult> {
        let started = Instant::now();
        let started_at = Utc::now();

        let decomposition = self.decomposer.decompose(request)?;
        let plan = self.engine.delegate(&decomposition.tasks, overrides)?;

        let session_id = SessionId::new();
        info!(
            session_id = %session_id,
            tasks = plan.len(),
            unassigned = plan.unassigned().count(),
            "Session started"
        );

        let results = self
            .coordinator
            .execute_since(&plan, executor, cancel, tokio::time::Instant::from_std(started))
            .await?;
        Ok(self
            .aggregator
            .aggregate(session_id, request, &plan, results, started, started_at))
    }
}
