use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::agent::{AgentCapability, AgentProfile};
use crate::core::score::{peak_fit, ComplexityRange, Confidence, MAX_CONFIDENCE, MIN_CONFIDENCE};
use crate::orchestration::{
    AgentOverride, CapabilityRegistry, CoordinatorConfig, OverrideSet, RetryPolicy,
    DEFAULT_CONFIDENCE_FLOOR, DEFAULT_DECOMPOSITION_THRESHOLD, DEFAULT_MAX_SUBTASKS,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub delegation: DelegationConfig,
    #[serde(default)]
    pub decomposition: DecompositionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<AgentOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Minimum score a candidate needs to be assigned.
    pub confidence_floor: f64,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Structural confidence below which a request is ambiguous.
    pub confidence_threshold: f64,
    pub max_subtasks: usize,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_DECOMPOSITION_THRESHOLD,
            max_subtasks: DEFAULT_MAX_SUBTASKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub pool_size: usize,
    /// Unset means bounded only by dependency width and pool size.
    pub max_concurrency: Option<usize>,
    pub task_timeout_secs: u64,
    pub session_deadline_secs: Option<u64>,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            max_concurrency: None,
            task_timeout_secs: 300,
            session_deadline_secs: None,
            max_retries: 2,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5000,
        }
    }
}

impl ExecutionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_max_delay(Duration::from_millis(self.max_backoff_ms))
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            pool_size: self.pool_size,
            max_concurrency: self.max_concurrency,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            session_deadline: self.session_deadline_secs.map(Duration::from_secs),
            retry: self.retry_policy(),
        }
    }
}

/// An agent declared in `[[agents]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_min_complexity")]
    pub min_complexity: u8,
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u8,
    #[serde(default = "default_baseline")]
    pub baseline: f64,
}

/// Default capability band, centred on the complexity the decomposer gives
/// typical fragments.
pub const DEFAULT_MIN_COMPLEXITY: u8 = 1;
pub const DEFAULT_MAX_COMPLEXITY: u8 = 7;
pub const DEFAULT_BASELINE: f64 = 0.90;

fn default_min_complexity() -> u8 {
    DEFAULT_MIN_COMPLEXITY
}

fn default_max_complexity() -> u8 {
    DEFAULT_MAX_COMPLEXITY
}

fn default_baseline() -> f64 {
    DEFAULT_BASELINE
}

impl AgentConfig {
    pub fn to_profile(&self) -> Result<AgentProfile> {
        let capabilities = self
            .capabilities
            .iter()
            .map(|c| {
                let range = ComplexityRange::new(c.min_complexity, c.max_complexity)?;
                AgentCapability::new(&c.name, &c.description, range, c.baseline)
            })
            .collect::<Result<Vec<_>>>()?;
        AgentProfile::new(
            self.id.as_str(),
            self.name.as_deref().unwrap_or(&self.id),
            &self.description,
            capabilities,
        )
    }
}

impl Config {
    pub fn weave_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".weave"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::weave_dir()?.join("weave.toml"))
    }

    /// Load `~/.weave/weave.toml`, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading config");
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        debug!(
            agents = config.agents.len(),
            overrides = config.overrides.len(),
            pool_size = config.execution.pool_size,
            "Config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "Creating config directory");
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        let floor = self.delegation.confidence_floor;
        if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&floor) {
            return Err(Error::Validation(format!(
                "delegation.confidence_floor {} is outside [{:.2}, {:.2}]",
                floor, MIN_CONFIDENCE, MAX_CONFIDENCE
            )));
        }

        let threshold = self.decomposition.confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Validation(format!(
                "decomposition.confidence_threshold {} is outside (0, 1]",
                threshold
            )));
        }
        if self.decomposition.max_subtasks == 0 {
            return Err(Error::Validation(
                "decomposition.max_subtasks must be at least 1".to_string(),
            ));
        }

        let execution = &self.execution;
        if execution.pool_size == 0 {
            return Err(Error::Validation(
                "execution.pool_size must be at least 1".to_string(),
            ));
        }
        if execution.max_concurrency == Some(0) {
            return Err(Error::Validation(
                "execution.max_concurrency must be at least 1".to_string(),
            ));
        }
        if execution.task_timeout_secs == 0 {
            return Err(Error::Validation(
                "execution.task_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(execution.backoff_multiplier >= 1.0) {
            return Err(Error::Validation(format!(
                "execution.backoff_multiplier {} must be >= 1.0",
                execution.backoff_multiplier
            )));
        }

        for agent in &self.agents {
            for capability in &agent.capabilities {
                let range =
                    ComplexityRange::new(capability.min_complexity, capability.max_complexity)
                        .map_err(|e| {
                            Error::Validation(format!(
                                "agent '{}' capability '{}': {}",
                                agent.id, capability.name, e
                            ))
                        })?;
                // A capability that cannot reach the floor is never assigned.
                let best = Confidence::clamped(capability.baseline).value() * peak_fit(&range);
                if best < floor {
                    return Err(Error::Validation(format!(
                        "agent '{}' capability '{}' scores at most {:.2}, below the confidence floor {:.2}",
                        agent.id, capability.name, best, floor
                    )));
                }
            }
        }
        Ok(())
    }

    /// Populate a registry from `[[agents]]`.
    pub fn build_registry(&self) -> Result<Arc<CapabilityRegistry>> {
        let profiles = self
            .agents
            .iter()
            .map(AgentConfig::to_profile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(CapabilityRegistry::from_profiles(profiles)?))
    }

    /// Compile `[[overrides]]` into a session override source.
    pub fn override_set(&self) -> Result<OverrideSet> {
        OverrideSet::new(self.overrides.clone())
    }
}
