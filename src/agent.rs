//! Agent profiles and the capabilities they declare.

use crate::core::score::{Complexity, ComplexityRange, Confidence};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier of a registered agent, e.g. `"fs-agent"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named skill an agent can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    name: String,
    description: String,
    complexity: ComplexityRange,
    baseline: Confidence,
}

impl AgentCapability {
    /// Create a capability. The baseline confidence is clamped into
    /// `[0.70, 0.95]`; the name is normalized to lowercase.
    pub fn new(
        name: &str,
        description: &str,
        complexity: ComplexityRange,
        baseline: f64,
    ) -> Result<Self> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::Validation(
                "capability name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name,
            description: description.to_string(),
            complexity,
            baseline: Confidence::clamped(baseline),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn complexity(&self) -> &ComplexityRange {
        &self.complexity
    }

    pub fn baseline(&self) -> Confidence {
        self.baseline
    }

    pub fn supports(&self, complexity: Complexity) -> bool {
        self.complexity.contains(complexity)
    }
}

/// A registered worker and its ordered capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    id: AgentId,
    name: String,
    description: String,
    capabilities: Vec<AgentCapability>,
}

impl AgentProfile {
    /// Create a profile. At least one capability is required and
    /// capability names must be unique within the profile.
    pub fn new(
        id: impl Into<AgentId>,
        name: &str,
        description: &str,
        capabilities: Vec<AgentCapability>,
    ) -> Result<Self> {
        let id = id.into();
        if id.as_str().trim().is_empty() {
            return Err(Error::Validation("agent id must not be empty".to_string()));
        }
        if capabilities.is_empty() {
            return Err(Error::Validation(format!(
                "agent {} declares no capabilities",
                id
            )));
        }
        let mut seen = HashSet::new();
        for capability in &capabilities {
            if !seen.insert(capability.name()) {
                return Err(Error::Validation(format!(
                    "agent {} declares capability '{}' twice",
                    id,
                    capability.name()
                )));
            }
        }
        Ok(Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            capabilities,
        })
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &[AgentCapability] {
        &self.capabilities
    }

    /// Look up a declared capability by name (case-insensitive).
    pub fn capability(&self, name: &str) -> Option<&AgentCapability> {
        let name = name.to_lowercase();
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Highest baseline across all declared capabilities.
    pub fn best_baseline(&self) -> Confidence {
        self.capabilities
            .iter()
            .map(AgentCapability::baseline)
            .fold(Confidence::clamped(0.0), |best, c| {
                if c > best {
                    c
                } else {
                    best
                }
            })
    }
}
