//! Coordinator for dependency-ordered parallel task execution.
//!
//! The coordinator walks the task graph of a [`DelegationPlan`], dispatching
//! ready tasks to a bounded [`WorkerPool`] while respecting dependencies,
//! per-task timeouts, the retry budget and the session cancellation token.
//! Every task in the plan ends with exactly one [`TaskResult`].

use crate::agent::AgentId;
use crate::core::dag::TaskDAG;
use crate::core::plan::DelegationPlan;
use crate::core::score::Confidence;
use crate::core::task::{
    Assignment, FailureReason, TaskDelegation, TaskId, TaskResult, TaskStatus,
};
use crate::error::Result;
use crate::orchestration::executor::{AgentExecutor, ExecutionOutput};
use crate::orchestration::pool::WorkerPool;
use crate::orchestration::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events emitted by the coordinator for task lifecycle changes.
///
/// These let a session sink render progress without polling. Events are
/// dropped if the channel is full.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// Every dependency of a task succeeded; it waits for a pool slot.
    TaskReady { task_id: TaskId },
    /// A task was handed to its agent.
    TaskStarted { task_id: TaskId, agent_id: AgentId },
    /// A task finished successfully.
    TaskSucceeded { task_id: TaskId },
    /// A task failed, or was never run.
    TaskFailed {
        task_id: TaskId,
        reason: FailureReason,
    },
    /// Every task in the plan has a result.
    AllTasksFinished,
}

impl CoordinatorEvent {
    /// The task and the status it moved to, if this is a task event.
    pub fn task_status(&self) -> Option<(TaskId, TaskStatus)> {
        match self {
            CoordinatorEvent::TaskReady { task_id } => Some((*task_id, TaskStatus::Ready)),
            CoordinatorEvent::TaskStarted { task_id, .. } => Some((*task_id, TaskStatus::Running)),
            CoordinatorEvent::TaskSucceeded { task_id } => Some((*task_id, TaskStatus::Succeeded)),
            CoordinatorEvent::TaskFailed { task_id, reason } => Some((
                *task_id,
                TaskStatus::Failed {
                    reason: reason.clone(),
                },
            )),
            CoordinatorEvent::AllTasksFinished => None,
        }
    }
}

/// Execution limits for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Size of the worker pool.
    pub pool_size: usize,
    /// Optional cap below the pool size.
    pub max_concurrency: Option<usize>,
    /// Bound on a single execution attempt.
    pub task_timeout: Duration,
    /// Aggregate deadline for the whole session.
    pub session_deadline: Option<Duration>,
    /// Retry budget for transient executor errors.
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            max_concurrency: None,
            task_timeout: Duration::from_secs(300),
            session_deadline: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Effective number of concurrent executions.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .map_or(self.pool_size, |cap| cap.min(self.pool_size))
            .max(1)
    }
}

/// What a pooled execution reports back to the coordinator.
#[derive(Debug)]
struct Attempted {
    outcome: std::result::Result<ExecutionOutput, FailureReason>,
    finished_at: DateTime<Utc>,
}

#[derive(Debug)]
struct InFlight {
    started_at: DateTime<Utc>,
    attempts: Arc<AtomicU32>,
}

/// Runs a delegation plan to completion.
///
/// # Example
///
/// ```ignore
/// let coordinator = ExecutionCoordinator::new(CoordinatorConfig::default());
/// let results = coordinator
///     .execute(&plan, Arc::new(router), CancellationToken::new())
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionCoordinator {
    config: CoordinatorConfig,
    event_tx: Option<mpsc::Sender<CoordinatorEvent>>,
}

impl ExecutionCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            event_tx: None,
        }
    }

    /// Emit lifecycle events on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<CoordinatorEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Execute every task in `plan`.
    ///
    /// Returns one result per task, in dependency order. Task-level
    /// failures are recorded in the results, never returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `DependencyCycle` or `UnknownDependency` if the plan's graph
    /// is invalid; nothing is executed in that case.
    pub async fn execute(
        &self,
        plan: &DelegationPlan,
        executor: Arc<dyn AgentExecutor>,
        cancel: CancellationToken,
    ) -> Result<Vec<TaskResult>> {
        self.execute_since(plan, executor, cancel, Instant::now())
            .await
    }

    /// Execute every task in `plan` for a session that began at
    /// `session_started`.
    ///
    /// The session deadline is measured from `session_started`, so time
    /// spent decomposing and delegating counts against it. A deadline that
    /// has already passed cancels the session before any task runs.
    pub async fn execute_since(
        &self,
        plan: &DelegationPlan,
        executor: Arc<dyn AgentExecutor>,
        cancel: CancellationToken,
        session_started: Instant,
    ) -> Result<Vec<TaskResult>> {
        let dag = plan.dag()?;
        let order = dag.topological_order()?;
        let session = cancel.child_token();
        let mut pool: WorkerPool<Attempted> = WorkerPool::new(self.config.concurrency());
        let mut run = RunState::new(plan, dag, self.event_tx.as_ref());

        info!(
            tasks = plan.len(),
            concurrency = pool.max_concurrent(),
            "Starting execution"
        );

        for assignment in plan.assignments() {
            if let Assignment::Unassignable { task, reason } = assignment {
                debug!(task_id = %task.id, reason = %reason, "Task is unassignable");
                run.fail_with_dependents(task.id, FailureReason::NoCapableAgent);
            }
        }

        let deadline = self.config.session_deadline.map(|d| session_started + d);
        let deadline_elapsed = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline_elapsed);

        let mut cancelled = false;
        loop {
            if deadline.is_some_and(|at| Instant::now() >= at) && !session.is_cancelled() {
                warn!("Session deadline elapsed, cancelling running tasks");
                session.cancel();
            }
            if session.is_cancelled() {
                cancelled = true;
                break;
            }

            self.dispatch_ready_tasks(&mut run, &mut pool, &executor, &session)?;

            // Nothing running after a dispatch pass means every task settled:
            // failures propagate eagerly, so no task can wait on an unsettled
            // dependency that is not itself running or ready.
            if pool.active_count() == 0 {
                break;
            }

            tokio::select! {
                biased;
                _ = session.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = &mut deadline_elapsed => {
                    warn!("Session deadline elapsed, cancelling running tasks");
                    session.cancel();
                    cancelled = true;
                    break;
                }
                joined = pool.join_next() => {
                    if let Some((task_id, outcome)) = joined {
                        run.handle_finished(task_id, outcome);
                    }
                }
            }
        }

        if cancelled {
            let interrupted = pool.abort_all().await;
            info!(interrupted = interrupted.len(), "Session cancelled");
            for task_id in &order {
                run.fail(*task_id, FailureReason::SessionCancelled);
            }
        }

        run.emit(CoordinatorEvent::AllTasksFinished);
        Ok(run.into_results(&order))
    }

    /// Dispatch ready tasks to the pool.
    ///
    /// Spawns executions for ready tasks up to the pool's capacity.
    /// Returns the number of tasks dispatched.
    fn dispatch_ready_tasks(
        &self,
        run: &mut RunState<'_>,
        pool: &mut WorkerPool<Attempted>,
        executor: &Arc<dyn AgentExecutor>,
        session: &CancellationToken,
    ) -> Result<usize> {
        let plan = run.plan;
        let mut dispatched = 0;

        for task_id in run.dag.ready_tasks(&run.succeeded, &run.settled) {
            if pool.is_running(&task_id) {
                continue;
            }
            run.mark_ready(task_id);
            if !pool.has_capacity() {
                continue;
            }
            let Some(delegation) = plan.get(&task_id).and_then(Assignment::delegation) else {
                continue;
            };

            let agent_id = delegation.assigned_agent().clone();
            let attempts = Arc::new(AtomicU32::new(0));
            let execution = attempt_with_retry(
                delegation.clone(),
                Arc::clone(executor),
                self.config.retry.clone(),
                self.config.task_timeout,
                session.clone(),
                Arc::clone(&attempts),
            );
            // Taken before spawning: on a multi-thread runtime the execution
            // can finish before `spawn` returns.
            let started_at = Utc::now();
            pool.spawn(task_id, agent_id.clone(), execution)?;

            run.in_flight.insert(
                task_id,
                InFlight {
                    started_at,
                    attempts,
                },
            );
            run.set_status(task_id, TaskStatus::Running);
            debug!(task_id = %task_id, agent_id = %agent_id, "Task started");
            run.emit(CoordinatorEvent::TaskStarted { task_id, agent_id });
            dispatched += 1;
        }

        Ok(dispatched)
    }
}

/// Run one delegation, retrying transient executor errors with backoff.
///
/// Timeouts and permanent errors fail on the first occurrence.
async fn attempt_with_retry(
    delegation: TaskDelegation,
    executor: Arc<dyn AgentExecutor>,
    policy: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
    attempts: Arc<AtomicU32>,
) -> Attempted {
    let task_id = delegation.task_id();
    let outcome = loop {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let result =
            tokio::time::timeout(timeout, executor.execute(&delegation, cancel.clone())).await;

        match result {
            Ok(Ok(output)) => break Ok(output),
            Err(_) => {
                warn!(task_id = %task_id, ?timeout, "Task timed out");
                break Err(FailureReason::Timeout);
            }
            Ok(Err(e)) if e.retryable && policy.should_retry(attempt) => {
                warn!(
                    task_id = %task_id,
                    attempt,
                    error = %e.message,
                    "Transient executor error, retrying"
                );
                if !policy.backoff(attempt, &cancel).await {
                    break Err(FailureReason::SessionCancelled);
                }
            }
            Ok(Err(e)) => {
                break Err(FailureReason::ExecutionFailed { message: e.message });
            }
        }
    };

    Attempted {
        outcome,
        finished_at: Utc::now(),
    }
}

/// Mutable bookkeeping for one `execute` call.
struct RunState<'a> {
    plan: &'a DelegationPlan,
    dag: TaskDAG,
    succeeded: HashSet<TaskId>,
    settled: HashSet<TaskId>,
    statuses: HashMap<TaskId, TaskStatus>,
    in_flight: HashMap<TaskId, InFlight>,
    results: HashMap<TaskId, TaskResult>,
    events: Option<&'a mpsc::Sender<CoordinatorEvent>>,
}

impl<'a> RunState<'a> {
    fn new(
        plan: &'a DelegationPlan,
        dag: TaskDAG,
        events: Option<&'a mpsc::Sender<CoordinatorEvent>>,
    ) -> Self {
        Self {
            plan,
            dag,
            succeeded: HashSet::new(),
            settled: HashSet::new(),
            statuses: HashMap::new(),
            in_flight: HashMap::new(),
            results: HashMap::new(),
            events,
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        if let Some(tx) = self.events {
            if tx.try_send(event).is_err() {
                debug!("Coordinator event dropped");
            }
        }
    }

    fn status(&self, task_id: &TaskId) -> TaskStatus {
        self.statuses.get(task_id).cloned().unwrap_or_default()
    }

    fn set_status(&mut self, task_id: TaskId, status: TaskStatus) {
        debug!(task_id = %task_id, from = %self.status(&task_id), to = %status, "Task status changed");
        self.statuses.insert(task_id, status);
    }

    /// Move a pending task whose dependencies all succeeded to `Ready`.
    fn mark_ready(&mut self, task_id: TaskId) {
        if self.status(&task_id) == TaskStatus::Pending {
            self.set_status(task_id, TaskStatus::Ready);
            self.emit(CoordinatorEvent::TaskReady { task_id });
        }
    }

    fn handle_finished(&mut self, task_id: TaskId, outcome: std::result::Result<Attempted, String>) {
        match outcome {
            Ok(Attempted {
                outcome: Ok(output),
                finished_at,
            }) => self.succeed(task_id, output, finished_at),
            Ok(Attempted {
                outcome: Err(reason),
                ..
            }) => self.fail_with_dependents(task_id, reason),
            Err(panic) => self.fail_with_dependents(
                task_id,
                FailureReason::ExecutionFailed {
                    message: format!("executor panicked: {}", panic),
                },
            ),
        }
    }

    fn succeed(&mut self, task_id: TaskId, output: ExecutionOutput, finished_at: DateTime<Utc>) {
        let plan = self.plan;
        let Some(delegation) = plan.get(&task_id).and_then(Assignment::delegation) else {
            return;
        };
        let Some(in_flight) = self.in_flight.remove(&task_id) else {
            return;
        };
        if !self.settled.insert(task_id) {
            return;
        }

        let confidence = output
            .confidence
            .map(Confidence::clamped)
            .unwrap_or_else(|| delegation.confidence());
        let attempts = in_flight.attempts.load(Ordering::SeqCst);

        info!(
            task_id = %task_id,
            agent_id = %delegation.assigned_agent(),
            confidence = confidence.value(),
            attempts,
            "Task succeeded"
        );
        self.succeeded.insert(task_id);
        self.set_status(task_id, TaskStatus::Succeeded);
        self.results.insert(
            task_id,
            TaskResult::succeeded(
                task_id,
                delegation.assigned_agent().clone(),
                confidence,
                output.payload,
                in_flight.started_at,
                finished_at,
                attempts,
            ),
        );
        self.emit(CoordinatorEvent::TaskSucceeded { task_id });
    }

    /// Record a failure for `task_id` if it has no result yet.
    fn fail(&mut self, task_id: TaskId, reason: FailureReason) {
        if !self.settled.insert(task_id) {
            return;
        }
        let agent_id = self
            .plan
            .get(&task_id)
            .and_then(Assignment::delegation)
            .map(|d| d.assigned_agent().clone());
        let (started_at, attempts) = match self.in_flight.remove(&task_id) {
            Some(in_flight) => (
                Some(in_flight.started_at),
                in_flight.attempts.load(Ordering::SeqCst),
            ),
            None => (None, 0),
        };

        warn!(task_id = %task_id, reason = %reason, "Task failed");
        self.set_status(
            task_id,
            TaskStatus::Failed {
                reason: reason.clone(),
            },
        );
        self.emit(CoordinatorEvent::TaskFailed {
            task_id,
            reason: reason.clone(),
        });
        self.results.insert(
            task_id,
            TaskResult::failed(task_id, agent_id, reason, started_at, attempts),
        );
    }

    /// Fail `task_id` and block every transitive dependent without running it.
    fn fail_with_dependents(&mut self, task_id: TaskId, reason: FailureReason) {
        self.fail(task_id, reason);
        for dependent in self.dag.transitive_dependents(&task_id) {
            self.fail(
                dependent,
                FailureReason::BlockedByDependency {
                    dependency: task_id,
                },
            );
        }
    }

    fn into_results(mut self, order: &[TaskId]) -> Vec<TaskResult> {
        order
            .iter()
            .filter_map(|task_id| self.results.remove(task_id))
            .collect()
    }
}
