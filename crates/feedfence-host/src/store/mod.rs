//! Policy store: fetch, validate, persist.
//!
//! Produces a best-effort policy via a fallback chain: network fetch with
//! no-cache semantics, then a bundled install-relative file, then whatever a
//! previous run persisted. Every successful step updates both the in-memory
//! cache and durable storage so the persisted step keeps working across
//! process restarts. Only total exhaustion surfaces an error; callers must
//! refuse to open a provider without a policy.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::fs;

use feedfence_policy::{parser, Policy, PolicyError};

use crate::config::PolicySection;
use crate::error::Result;

const POLICY_FILE: &str = "policy.json";

pub struct PolicyStore {
    source_url: String,
    local_paths: Vec<PathBuf>,
    storage_path: PathBuf,
    http: reqwest::Client,
    cached: RwLock<Option<Arc<Policy>>>,
}

impl PolicyStore {
    pub fn new(cfg: &PolicySection) -> Self {
        Self {
            source_url: cfg.url.clone(),
            local_paths: cfg.local_paths.iter().map(PathBuf::from).collect(),
            storage_path: PathBuf::from(&cfg.storage_dir).join(POLICY_FILE),
            http: reqwest::Client::new(),
            cached: RwLock::new(None),
        }
    }

    /// Run the full fallback chain and return the best available policy.
    pub async fn load(&self) -> Result<Arc<Policy>> {
        match self.fetch_remote().await {
            Ok((policy, raw)) => return Ok(self.remember(policy, Some(&raw)).await),
            Err(e) => {
                tracing::warn!(url = %self.source_url, error = %e, "policy fetch failed, trying bundled copies");
            }
        }

        match self.read_bundled().await {
            Ok((policy, raw)) => return Ok(self.remember(policy, Some(&raw)).await),
            Err(e) => {
                tracing::warn!(error = %e, "no bundled policy, falling back to persisted cache");
            }
        }

        self.cached().await
    }

    /// In-memory cache first, then durable storage from a previous run.
    /// Failing here means the session layer must not open a provider.
    pub async fn cached(&self) -> Result<Arc<Policy>> {
        if let Some(policy) = self.cached.read().ok().and_then(|g| g.clone()) {
            return Ok(policy);
        }

        let raw = fs::read_to_string(&self.storage_path).await.map_err(|e| {
            tracing::debug!(path = %self.storage_path.display(), error = %e, "no persisted policy");
            PolicyError::Unavailable
        })?;
        let policy = parser::parse_str(&raw).map_err(|e| {
            tracing::warn!(error = %e, "persisted policy is corrupt");
            PolicyError::Unavailable
        })?;

        tracing::info!(version = %policy.version, "using persisted policy");
        Ok(self.remember(policy, None).await)
    }

    async fn fetch_remote(&self) -> Result<(Policy, String)> {
        let response = self
            .http
            .get(&self.source_url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::PRAGMA, "no-cache")
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        let policy = parser::parse_str(&body)?;
        tracing::info!(version = %policy.version, "fetched policy");
        Ok((policy, body))
    }

    /// Try each bundled candidate path, both as configured and relative to
    /// the executable's directory.
    async fn read_bundled(&self) -> Result<(Policy, String)> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()));

        for configured in &self.local_paths {
            let mut candidates = vec![configured.clone()];
            if let Some(dir) = &exe_dir {
                candidates.push(dir.join(configured));
            }
            for candidate in candidates {
                let Ok(raw) = fs::read_to_string(&candidate).await else {
                    continue;
                };
                match parser::parse_str(&raw) {
                    Ok(policy) => {
                        tracing::info!(path = %candidate.display(), version = %policy.version, "loaded bundled policy");
                        return Ok((policy, raw));
                    }
                    Err(e) => {
                        tracing::warn!(path = %candidate.display(), error = %e, "bundled policy is invalid");
                    }
                }
            }
        }

        Err(PolicyError::Unavailable.into())
    }

    /// Set the in-memory cache and, when raw text is available, rewrite
    /// durable storage wholesale.
    async fn remember(&self, policy: Policy, raw: Option<&str>) -> Arc<Policy> {
        let policy = Arc::new(policy);
        if let Some(raw) = raw {
            if let Err(e) = self.persist(raw).await {
                tracing::warn!(path = %self.storage_path.display(), error = %e, "failed to persist policy");
            }
        }
        if let Ok(mut cached) = self.cached.write() {
            *cached = Some(policy.clone());
        }
        policy
    }

    async fn persist(&self, raw: &str) -> std::io::Result<()> {
        if let Some(dir) = self.storage_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&self.storage_path, raw).await
    }
}
