//! The single interface every concrete agent implements.
//!
//! The coordinator never knows what kind of agent it is talking to: a
//! filesystem agent, a search agent, or a remote service all sit behind
//! [`AgentExecutor`]. [`ExecutorRouter`] dispatches by assigned agent id.

use crate::agent::AgentId;
use crate::core::task::TaskDelegation;
use crate::error::{AgentExecutionError, Error};
use crate::util;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What an executor returns for a successful task.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    /// Arbitrary result payload.
    pub payload: serde_json::Value,
    /// Confidence the agent reports for its own output. Falls back to the
    /// delegation confidence when absent.
    pub confidence: Option<f64>,
}

impl ExecutionOutput {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Runs one delegated task.
///
/// Implementations should watch `cancel` and return promptly once it
/// fires; the coordinator stops waiting on cancellation either way.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError>;
}

#[async_trait]
impl<T: AgentExecutor + ?Sized> AgentExecutor for Arc<T> {
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError> {
        (**self).execute(delegation, cancel).await
    }
}

/// Adapts an async closure into an [`AgentExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

impl<F, Fut> FnExecutor<F>
where
    F: Fn(TaskDelegation, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ExecutionOutput, AgentExecutionError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> AgentExecutor for FnExecutor<F>
where
    F: Fn(TaskDelegation, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ExecutionOutput, AgentExecutionError>> + Send,
{
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError> {
        (self.f)(delegation.clone(), cancel).await
    }
}

/// Adapts a synchronous backend (filesystem calls, blocking clients) into an
/// [`AgentExecutor`] by running it on the blocking pool.
pub struct BlockingExecutor<F> {
    f: Arc<F>,
    timeout: Option<Duration>,
}

impl<F> BlockingExecutor<F>
where
    F: Fn(TaskDelegation) -> Result<ExecutionOutput, AgentExecutionError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f: Arc::new(f),
            timeout: None,
        }
    }

    /// Stop waiting on the backend after `timeout`. The call is reported as a
    /// transient failure; the blocking thread still runs to completion.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F> AgentExecutor for BlockingExecutor<F>
where
    F: Fn(TaskDelegation) -> Result<ExecutionOutput, AgentExecutionError> + Send + Sync + 'static,
{
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        _cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError> {
        let f = Arc::clone(&self.f);
        let delegation = delegation.clone();
        let call = move || f(delegation);
        let joined = match self.timeout {
            Some(timeout) => util::blocking_with_timeout(timeout, call).await,
            None => util::blocking(call).await,
        };
        match joined {
            Ok(result) => result,
            Err(e @ Error::Timeout(_)) => Err(AgentExecutionError::new(e.to_string())),
            Err(e) => Err(AgentExecutionError::permanent(e.to_string())),
        }
    }
}

/// Routes each delegation to the executor registered for its agent.
#[derive(Default, Clone)]
pub struct ExecutorRouter {
    executors: HashMap<AgentId, Arc<dyn AgentExecutor>>,
    fallback: Option<Arc<dyn AgentExecutor>>,
}

impl ExecutorRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executor backing `agent`.
    pub fn route(mut self, agent: impl Into<AgentId>, executor: Arc<dyn AgentExecutor>) -> Self {
        self.executors.insert(agent.into(), executor);
        self
    }

    /// Executor used for agents with no explicit route.
    pub fn with_fallback(mut self, executor: Arc<dyn AgentExecutor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn has_route(&self, agent: &AgentId) -> bool {
        self.executors.contains_key(agent) || self.fallback.is_some()
    }
}

impl std::fmt::Debug for ExecutorRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRouter")
            .field("routes", &self.executors.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[async_trait]
impl AgentExecutor for ExecutorRouter {
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError> {
        let executor = self
            .executors
            .get(delegation.assigned_agent())
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                AgentExecutionError::permanent(format!(
                    "no executor registered for agent {}",
                    delegation.assigned_agent()
                ))
            })?;
        executor.execute(delegation, cancel).await
    }
}
