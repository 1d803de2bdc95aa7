//! Bounded pool of in-flight task executions.
//!
//! The `WorkerPool` owns every running execution future, enforces the
//! `max_concurrent` limit, and remembers which agent each task was handed
//! to so cancellation can report what was interrupted.

use crate::agent::AgentId;
use crate::core::task::TaskId;
use crate::error::{Error, Result};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome of one pooled execution. `Err` carries a panic message.
pub type Joined<T> = (TaskId, std::result::Result<T, String>);

/// Manages concurrently running task executions.
///
/// # Example
///
/// ```ignore
/// let mut pool: WorkerPool<u32> = WorkerPool::new(2);
/// pool.spawn(task_id, agent_id, async { 42 })?;
/// let (id, outcome) = pool.join_next().await.unwrap();
/// ```
pub struct WorkerPool<T> {
    tasks: JoinSet<Joined<T>>,
    /// Running tasks and the agent each one was assigned to.
    running: HashMap<TaskId, AgentId>,
    max_concurrent: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool running at most `max_concurrent` executions (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            running: HashMap::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Start executing `future` for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `PoolFull` if the pool is at capacity.
    pub fn spawn<F>(&mut self, task_id: TaskId, agent_id: AgentId, future: F) -> Result<()>
    where
        F: Future<Output = T> + Send + 'static,
    {
        if !self.has_capacity() {
            return Err(Error::PoolFull {
                max: self.max_concurrent,
            });
        }

        debug!(task_id = %task_id, agent_id = %agent_id, "Spawning execution");
        self.running.insert(task_id, agent_id);
        self.tasks.spawn(async move {
            let outcome = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|panic| panic_message(panic.as_ref()));
            (task_id, outcome)
        });
        Ok(())
    }

    /// Wait for the next execution to finish.
    ///
    /// Returns `None` when nothing is running.
    pub async fn join_next(&mut self) -> Option<Joined<T>> {
        loop {
            match self.tasks.join_next().await? {
                Ok((task_id, outcome)) => {
                    self.running.remove(&task_id);
                    return Some((task_id, outcome));
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => warn!(error = %e, "Pooled execution failed to join"),
            }
        }
    }

    /// Abort every running execution and wait for them to unwind.
    ///
    /// Returns the interrupted tasks with their assigned agents.
    pub async fn abort_all(&mut self) -> Vec<(TaskId, AgentId)> {
        self.tasks.shutdown().await;
        self.running.drain().collect()
    }

    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.running.contains_key(task_id)
    }

    /// Get the number of running executions.
    pub fn active_count(&self) -> usize {
        self.running.len()
    }

    /// Check if the pool can accept another execution.
    pub fn has_capacity(&self) -> bool {
        self.active_count() < self.max_concurrent
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "executor panicked".to_string()
    }
}
