//! feedfence-doctor
//!
//! Offline policy health check:
//! - load the host config (default path or first CLI argument)
//! - run the full policy fallback chain (fetch, bundled, persisted)
//! - compile rules for every provider in the policy
//! - print a per-provider summary
//!
//! Exits non-zero when no policy is available or any provider fails to
//! compile, so it can gate a release pipeline.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use feedfence_host::{config, providers, rules::RuleCache, store::PolicyStore};

const DEFAULT_CONFIG: &str = "feedfence.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.into());
    let cfg = match config::load_from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Missing config file is fine for a doctor run; defaults cover it.
            tracing::warn!(path = %config_path, error = %e, "config unavailable, using defaults");
            match config::load_from_str("version: 1") {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::error!(error = %e, "default config invalid");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let store = Arc::new(PolicyStore::new(&cfg.policy));
    let policy = match store.load().await {
        Ok(policy) => policy,
        Err(e) => {
            tracing::error!(error = %e, "no policy available from any source");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(version = %policy.version, providers = policy.providers.len(), "policy loaded");

    let cache = RuleCache::new();
    let mut failures = 0usize;
    for provider_id in policy.providers.keys() {
        match cache.rules_for(&policy, provider_id) {
            Ok(rules) => {
                let profile = providers::profile_for(provider_id);
                tracing::info!(
                    provider = %provider_id,
                    start = %rules.start,
                    allow = rules.allow.len(),
                    block = rules.block.len(),
                    hide = rules.hide_selectors.len(),
                    filters = rules.web_request_filters.len(),
                    enforcement = ?profile.enforcement,
                    "provider ok"
                );
            }
            Err(e) => {
                failures += 1;
                tracing::error!(provider = %provider_id, error = %e, "provider rules failed to compile");
            }
        }
    }

    if failures > 0 {
        tracing::error!(failures, "policy check failed");
        return ExitCode::FAILURE;
    }
    tracing::info!("all providers compiled");
    ExitCode::SUCCESS
}
