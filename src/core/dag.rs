//! Task DAG (Directed Acyclic Graph) for dependency management.
//!
//! This module provides the TaskDAG structure that represents the
//! dependencies of one session's tasks, enabling parallel execution of
//! independent tasks and failure propagation to dependents.

use crate::core::task::{Assignment, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Walker};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// A node in the task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagNode {
    pub id: TaskId,
    pub name: String,
}

/// The task dependency graph.
///
/// Nodes are tasks; an edge `a -> b` means `b` depends on `a`.
pub struct TaskDAG {
    /// The underlying directed graph.
    graph: DiGraph<DagNode, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskDAG {
    /// Create a new empty TaskDAG.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Build the graph for a delegation plan.
    ///
    /// # Errors
    /// - `Validation` if a task id appears twice
    /// - `UnknownDependency` if a dependency names a task outside the plan
    /// - `DependencyCycle` if the dependencies are not acyclic
    pub fn from_assignments(assignments: &[Assignment]) -> Result<Self> {
        let mut dag = Self::new();
        for assignment in assignments {
            let id = assignment.task_id();
            if dag.contains_task(&id) {
                return Err(Error::Validation(format!(
                    "task {} appears more than once in the plan",
                    id
                )));
            }
            dag.add_task(id, assignment.name());
        }

        for assignment in assignments {
            let to = assignment.task_id();
            for dependency in assignment.dependencies() {
                let from_index = *dag.task_index.get(dependency).ok_or(
                    Error::UnknownDependency {
                        task: to,
                        dependency: *dependency,
                    },
                )?;
                let to_index = dag.task_index[&to];
                if from_index == to_index {
                    return Err(Error::DependencyCycle(format!(
                        "task '{}' depends on itself",
                        assignment.name()
                    )));
                }
                dag.graph.update_edge(from_index, to_index, ());
            }
        }

        dag.topological_order()?;
        Ok(dag)
    }

    /// Add a task to the DAG.
    ///
    /// If the task already exists, returns the existing NodeIndex.
    fn add_task(&mut self, id: TaskId, name: &str) -> NodeIndex {
        if let Some(&index) = self.task_index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(DagNode {
            id,
            name: name.to_string(),
        });
        self.task_index.insert(id, index);
        index
    }

    /// Get the number of tasks in the DAG.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependencies (edges) in the DAG.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the DAG contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Every task reachable from `id` through dependent edges, excluding `id`.
    pub fn transitive_dependents(&self, id: &TaskId) -> Vec<TaskId> {
        let Some(&start) = self.task_index.get(id) else {
            return Vec::new();
        };
        Bfs::new(&self.graph, start)
            .iter(&self.graph)
            .filter(|&index| index != start)
            .map(|index| self.graph[index].id)
            .collect()
    }

    // ========== Scheduling Operations ==========

    /// Get all tasks ready to execute.
    ///
    /// A task is ready if it is not in `settled` and every dependency is in
    /// `succeeded`. Returned in insertion order.
    pub fn ready_tasks(
        &self,
        succeeded: &HashSet<TaskId>,
        settled: &HashSet<TaskId>,
    ) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter_map(|index| {
                let node = &self.graph[index];
                if settled.contains(&node.id) {
                    return None;
                }
                let deps_satisfied = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .all(|dep| succeeded.contains(&self.graph[dep].id));
                deps_satisfied.then_some(node.id)
            })
            .collect()
    }

    /// Get task ids in topological order (dependencies first).
    ///
    /// # Errors
    /// Returns `DependencyCycle` naming a task on the cycle.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let task_name = self
                .graph
                .node_weight(cycle.node_id())
                .map(|n| n.name.as_str())
                .unwrap_or("unknown");
            Error::DependencyCycle(format!("cycle detected at task '{}'", task_name))
        })?;
        Ok(sorted.into_iter().map(|index| self.graph[index].id).collect())
    }
}

impl Default for TaskDAG {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskDAG {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDAG")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
