//! Agent selection for planned tasks.
//!
//! Overrides are consulted first and always win. Otherwise every agent
//! declaring the task's capability is scored as
//! `baseline * complexity_fit(task, range)`; the best score at or above the
//! floor wins, with ties going to the earliest registered agent.

use crate::agent::AgentId;
use crate::core::plan::DelegationPlan;
use crate::core::score::{complexity_fit, Confidence, MIN_CONFIDENCE};
use crate::core::task::{Assignment, PlannedTask, TaskDelegation};
use crate::error::{Error, Result};
use crate::orchestration::registry::CapabilityRegistry;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default minimum score for an agent to be assigned.
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = MIN_CONFIDENCE;

/// A user rule forcing a specific agent for matching tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOverride {
    /// Case-insensitive regular expression matched against the task description.
    pub pattern: String,
    /// Agent to assign when the pattern matches.
    pub agent: AgentId,
    /// Why the user prefers this agent.
    pub reasoning: String,
    /// User who owns the rule.
    pub user: String,
}

impl AgentOverride {
    pub fn new(pattern: &str, agent: impl Into<AgentId>, reasoning: &str, user: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            agent: agent.into(),
            reasoning: reasoning.to_string(),
            user: user.to_string(),
        }
    }
}

/// Overrides compiled once per session. First match in declaration order wins.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    rules: Vec<(Regex, AgentOverride)>,
}

impl OverrideSet {
    /// Compile a set of overrides.
    ///
    /// # Errors
    /// Returns `InvalidPattern` if any pattern is not a valid regex.
    pub fn new(overrides: Vec<AgentOverride>) -> Result<Self> {
        let rules = overrides
            .into_iter()
            .map(|o| {
                let regex = RegexBuilder::new(&o.pattern).case_insensitive(true).build()?;
                Ok((regex, o))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The first override whose pattern matches `description`.
    pub fn find_match(&self, description: &str) -> Option<&AgentOverride> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(description))
            .map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Scores registered agents against tasks and binds the best match.
#[derive(Debug, Clone)]
pub struct DelegationEngine {
    registry: Arc<CapabilityRegistry>,
    floor: f64,
}

impl DelegationEngine {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Select an agent for one task.
    ///
    /// # Errors
    /// Returns `NoCapableAgent` when no override applies and no candidate
    /// scores at or above the floor.
    pub fn select(&self, task: &PlannedTask, overrides: &OverrideSet) -> Result<TaskDelegation> {
        if let Some(delegation) = self.apply_override(task, overrides) {
            return Ok(delegation);
        }

        let mut best: Option<(f64, AgentId, f64, f64)> = None;
        // `find` orders by baseline; ties on score must fall back to
        // registration order, so walk candidates by registry position.
        let mut candidates = self.registry.find(&task.capability);
        candidates.sort_by_key(|p| self.registry.position(p.id()).unwrap_or(usize::MAX));

        for profile in &candidates {
            let Some(capability) = profile.capability(&task.capability) else {
                continue;
            };
            let baseline = capability.baseline().value();
            let fit = complexity_fit(task.complexity, capability.complexity());
            let score = baseline * fit;
            debug!(
                task = %task.name,
                agent_id = %profile.id(),
                baseline,
                fit,
                score,
                "Scored candidate"
            );
            if best.as_ref().map_or(true, |(s, ..)| score > *s) {
                best = Some((score, profile.id().clone(), baseline, fit));
            }
        }

        match best {
            Some((score, agent, baseline, fit)) if score >= self.floor => {
                let reasoning = format!(
                    "capability '{}' on agent '{}': baseline {:.2} x complexity fit {:.2} = {:.2}",
                    task.capability, agent, baseline, fit, score
                );
                info!(task = %task.name, agent_id = %agent, score, "Delegated task");
                Ok(TaskDelegation::new(
                    task,
                    agent,
                    Confidence::clamped(score),
                    reasoning,
                ))
            }
            best => {
                let best_score = best.map_or(0.0, |(s, ..)| s);
                warn!(
                    task = %task.name,
                    capability = %task.capability,
                    best_score,
                    floor = self.floor,
                    "No capable agent"
                );
                Err(Error::NoCapableAgent {
                    capability: task.capability.clone(),
                    best_score,
                })
            }
        }
    }

    fn apply_override(&self, task: &PlannedTask, overrides: &OverrideSet) -> Option<TaskDelegation> {
        let rule = overrides.find_match(&task.description)?;
        let Some(profile) = self.registry.get(&rule.agent) else {
            warn!(
                task = %task.name,
                agent_id = %rule.agent,
                pattern = %rule.pattern,
                "Override names an unregistered agent; falling back to scoring"
            );
            return None;
        };
        let baseline = profile
            .capability(&task.capability)
            .map(|c| c.baseline())
            .unwrap_or_else(|| profile.best_baseline());
        info!(
            task = %task.name,
            agent_id = %rule.agent,
            user = %rule.user,
            "Applied override"
        );
        Some(TaskDelegation::new(
            task,
            rule.agent.clone(),
            baseline,
            format!("override: {}", rule.reasoning),
        ))
    }

    /// Delegate every planned task. Tasks without a capable agent become
    /// [`Assignment::Unassignable`] rather than being dropped.
    ///
    /// # Errors
    /// Returns an error only if the resulting plan is invalid (duplicate
    /// ids, unknown dependencies, or a dependency cycle).
    pub fn delegate(&self, tasks: &[PlannedTask], overrides: &OverrideSet) -> Result<DelegationPlan> {
        let assignments = tasks
            .iter()
            .map(|task| match self.select(task, overrides) {
                Ok(delegation) => Assignment::Delegated(delegation),
                Err(e) => Assignment::Unassignable {
                    task: task.clone(),
                    reason: e.to_string(),
                },
            })
            .collect();
        DelegationPlan::new(assignments)
    }
}
