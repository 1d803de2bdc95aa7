//! Append-only catalogue of agent profiles.
//!
//! The registry is populated at process start and read by the delegation
//! engine for every task. Lookups take a shared read lock; registration
//! takes the write lock only long enough to swap in the new profile.

use crate::agent::{AgentId, AgentProfile};
use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    /// Profiles in registration order.
    profiles: Vec<Arc<AgentProfile>>,
    /// Position of each agent in `profiles`.
    index: HashMap<AgentId, usize>,
}

/// Shared catalogue of agents and their capabilities.
///
/// Profiles are handed out as `Arc`s, so the engine references the
/// registered profile rather than copying it.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    inner: RwLock<Inner>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from profiles, failing on the first duplicate id.
    pub fn from_profiles(profiles: impl IntoIterator<Item = AgentProfile>) -> Result<Self> {
        let registry = Self::new();
        for profile in profiles {
            registry.register(profile)?;
        }
        Ok(registry)
    }

    // Writers never leave `Inner` half-updated; poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new agent.
    ///
    /// # Errors
    /// Returns `DuplicateAgent` if the identifier is already registered.
    pub fn register(&self, profile: AgentProfile) -> Result<()> {
        let mut inner = self.write();
        if inner.index.contains_key(profile.id()) {
            return Err(Error::DuplicateAgent(profile.id().clone()));
        }
        let id = profile.id().clone();
        let position = inner.profiles.len();
        info!(
            agent_id = %id,
            capabilities = profile.capabilities().len(),
            "Registered agent"
        );
        inner.profiles.push(Arc::new(profile));
        inner.index.insert(id, position);
        Ok(())
    }

    /// Register or atomically replace an agent's profile.
    ///
    /// A replaced profile keeps its original registration position, so
    /// tie-breaking order is unchanged. Returns the previous profile.
    pub fn replace(&self, profile: AgentProfile) -> Option<Arc<AgentProfile>> {
        let mut inner = self.write();
        let id = profile.id().clone();
        match inner.index.get(&id).copied() {
            Some(position) => {
                debug!(agent_id = %id, "Replaced agent profile");
                Some(std::mem::replace(
                    &mut inner.profiles[position],
                    Arc::new(profile),
                ))
            }
            None => {
                let position = inner.profiles.len();
                inner.profiles.push(Arc::new(profile));
                inner.index.insert(id, position);
                None
            }
        }
    }

    /// Agents declaring `capability`, best baseline first.
    ///
    /// Ties keep registration order (earliest first).
    pub fn find(&self, capability: &str) -> Vec<Arc<AgentProfile>> {
        let inner = self.read();
        let mut matches: Vec<(f64, Arc<AgentProfile>)> = inner
            .profiles
            .iter()
            .filter_map(|profile| {
                profile
                    .capability(capability)
                    .map(|c| (c.baseline().value(), Arc::clone(profile)))
            })
            .collect();
        // stable sort keeps registration order among equal baselines
        matches.sort_by(|a, b| b.0.total_cmp(&a.0));
        matches.into_iter().map(|(_, profile)| profile).collect()
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<AgentProfile>> {
        let inner = self.read();
        inner
            .index
            .get(id)
            .map(|&position| Arc::clone(&inner.profiles[position]))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.read().index.contains_key(id)
    }

    /// Registration position of an agent, used for deterministic tie-breaks.
    pub fn position(&self, id: &AgentId) -> Option<usize> {
        self.read().index.get(id).copied()
    }

    /// All profiles in registration order.
    pub fn agents(&self) -> Vec<Arc<AgentProfile>> {
        self.read().profiles.clone()
    }

    /// Every capability name declared by any agent.
    pub fn capability_names(&self) -> BTreeSet<String> {
        self.read()
            .profiles
            .iter()
            .flat_map(|p| p.capabilities().iter().map(|c| c.name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
