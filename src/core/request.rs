//! Caller-supplied request that starts an orchestration session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Hints that help the decomposer split a request it would otherwise
/// reject as ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Capability to use for fragments with no detectable intent.
    pub capability_hint: Option<String>,
    /// Chain every fragment after the previous one.
    #[serde(default)]
    pub sequential: bool,
    /// Upper bound on the number of subtasks.
    pub max_subtasks: Option<usize>,
}

/// The free-form query plus optional context and constraints.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRequest {
    query: String,
    #[serde(default)]
    context: HashMap<String, serde_json::Value>,
    constraints: Option<Constraints>,
}

impl DelegationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: HashMap::new(),
            constraints: None,
        }
    }

    /// Attach a context entry forwarded to executors.
    pub fn with_context(mut self, key: &str, value: serde_json::Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn context(&self) -> &HashMap<String, serde_json::Value> {
        &self.context
    }

    pub fn constraints(&self) -> Option<&Constraints> {
        self.constraints.as_ref()
    }
}
