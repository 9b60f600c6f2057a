//! Compiled-rule cache.
//!
//! Rules are compiled once per `(policy.version, provider_id)` pair and
//! shared read-only across the guard, injector, and network filter. A policy
//! replacement invalidates entries for superseded versions.

use std::sync::Arc;

use dashmap::DashMap;

use feedfence_policy::{compile, CompiledRules, Policy};

use crate::error::Result;
use crate::providers;

#[derive(Default)]
pub struct RuleCache {
    cache: DashMap<(String, String), Arc<CompiledRules>>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Compile (or reuse) rules for this policy version + provider, applying
    /// the host's start-URL override from the provider profile.
    pub fn rules_for(&self, policy: &Policy, provider_id: &str) -> Result<Arc<CompiledRules>> {
        let key = (policy.version.clone(), provider_id.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.value().clone());
        }

        let profile = providers::profile_for(provider_id);
        let rules = Arc::new(compile(policy, provider_id, profile.start_override)?);
        tracing::debug!(provider = %provider_id, version = %policy.version, "compiled rules");
        self.cache.insert(key, rules.clone());
        Ok(rules)
    }

    /// Discard rules compiled against superseded policy versions.
    pub fn retain_version(&self, version: &str) {
        self.cache.retain(|(v, _), _| v == version);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }
}
