//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A scripted executor standing in for real agent backends
//! - A standard registry of research/implementation/testing agents
//! - Orchestrators with fast retry and timeout settings

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use weave::agent::{AgentCapability, AgentId, AgentProfile};
use weave::core::score::ComplexityRange;
use weave::core::task::{TaskDelegation, TaskId};
use weave::error::AgentExecutionError;
use weave::orchestration::{
    AgentExecutor, CapabilityRegistry, CoordinatorConfig, ExecutionCoordinator, ExecutionOutput,
    Orchestrator, RetryPolicy,
};

/// What a scripted agent does when called.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    /// Fail with a non-retryable error.
    FailPermanently(&'static str),
    /// Fail with a retryable error for the first `times` attempts.
    FailTransiently { times: u32 },
    /// Never finish unless cancelled.
    Hang,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub delay: Duration,
    pub behavior: Behavior,
    pub confidence: Option<f64>,
}

impl Script {
    pub fn succeed() -> Self {
        Self {
            delay: Duration::ZERO,
            behavior: Behavior::Succeed,
            confidence: None,
        }
    }

    pub fn fail(message: &'static str) -> Self {
        Self {
            behavior: Behavior::FailPermanently(message),
            ..Self::succeed()
        }
    }

    pub fn flaky(times: u32) -> Self {
        Self {
            behavior: Behavior::FailTransiently { times },
            ..Self::succeed()
        }
    }

    pub fn hang() -> Self {
        Self {
            behavior: Behavior::Hang,
            ..Self::succeed()
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// One recorded executor invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub task_id: TaskId,
    pub task_name: String,
    pub capability: String,
    pub agent: AgentId,
    pub at: Instant,
}

/// Executor whose behavior is scripted per capability.
///
/// Capabilities without a script succeed immediately.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<Call>>,
    attempts: Mutex<HashMap<TaskId, u32>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, capability: &str, script: Script) -> Self {
        self.scripts.insert(capability.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, capability: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.capability == capability)
            .count()
    }
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        delegation: &TaskDelegation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, AgentExecutionError> {
        self.calls.lock().unwrap().push(Call {
            task_id: delegation.task_id(),
            task_name: delegation.name().to_string(),
            capability: delegation.capability().to_string(),
            agent: delegation.assigned_agent().clone(),
            at: Instant::now(),
        });
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(delegation.task_id()).or_insert(0);
            *entry += 1;
            *entry
        };

        let script = self
            .scripts
            .get(delegation.capability())
            .cloned()
            .unwrap_or_else(Script::succeed);

        if !script.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AgentExecutionError::permanent("cancelled"));
                }
                _ = tokio::time::sleep(script.delay) => {}
            }
        }

        let output = ExecutionOutput::new(serde_json::json!({
            "task": delegation.name(),
            "agent": delegation.assigned_agent().as_str(),
        }));
        let output = match script.confidence {
            Some(confidence) => output.with_confidence(confidence),
            None => output,
        };

        match script.behavior {
            Behavior::Succeed => Ok(output),
            Behavior::FailPermanently(message) => Err(AgentExecutionError::permanent(message)),
            Behavior::FailTransiently { times } if attempt <= times => Err(
                AgentExecutionError::new(format!("transient failure #{}", attempt)),
            ),
            Behavior::FailTransiently { .. } => Ok(output),
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(AgentExecutionError::permanent("cancelled"))
            }
        }
    }
}

/// Build a single-capability agent profile.
pub fn profile(id: &str, capability: &str, baseline: f64) -> AgentProfile {
    AgentProfile::new(
        id,
        id,
        &format!("{} agent", capability),
        vec![AgentCapability::new(
            capability,
            "",
            ComplexityRange::new(1, 7).unwrap(),
            baseline,
        )
        .unwrap()],
    )
    .unwrap()
}

/// Researcher, coder and tester. No agent declares "deployment".
pub fn standard_registry() -> Arc<CapabilityRegistry> {
    Arc::new(
        CapabilityRegistry::from_profiles([
            profile("researcher", "research", 0.95),
            profile("coder", "implementation", 0.92),
            profile("tester", "testing", 0.93),
        ])
        .unwrap(),
    )
}

/// Execution limits that keep tests fast.
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        task_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new().with_initial_delay(Duration::from_millis(5)),
        ..CoordinatorConfig::default()
    }
}

pub fn orchestrator_with(registry: Arc<CapabilityRegistry>, config: CoordinatorConfig) -> Orchestrator {
    Orchestrator::new(registry).with_coordinator(ExecutionCoordinator::new(config))
}

pub fn orchestrator(registry: Arc<CapabilityRegistry>) -> Orchestrator {
    orchestrator_with(registry, fast_config())
}
