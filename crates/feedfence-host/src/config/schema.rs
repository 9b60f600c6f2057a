use serde::Deserialize;

use crate::error::{HostError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub version: u32,

    #[serde(default)]
    pub policy: PolicySection,

    #[serde(default)]
    pub enforcement: EnforcementSection,
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HostError::Config("unsupported config version".into()));
        }
        self.policy.validate()?;
        self.enforcement.validate()?;
        Ok(())
    }
}

/// Where the policy document comes from and where it is persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Policy source endpoint; defaults to the local development backend.
    #[serde(default = "default_policy_url")]
    pub url: String,

    /// Install-relative candidates for the bundled policy file, tried in
    /// order when the network fetch fails.
    #[serde(default = "default_local_paths")]
    pub local_paths: Vec<String>,

    /// Directory holding the durably persisted policy from previous runs.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            url: default_policy_url(),
            local_paths: default_local_paths(),
            storage_dir: default_storage_dir(),
        }
    }
}

impl PolicySection {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(HostError::Config("policy.url must not be empty".into()));
        }
        if self.storage_dir.is_empty() {
            return Err(HostError::Config(
                "policy.storage_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_policy_url() -> String {
    "http://localhost:3001/api/policy".into()
}
fn default_local_paths() -> Vec<String> {
    vec![
        "policy/policy.local.json".into(),
        "resources/policy.local.json".into(),
    ]
}
fn default_storage_dir() -> String {
    ".feedfence".into()
}

/// Timing and dev switches for the enforcement layers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcementSection {
    /// Minimum gap between enforced redirects (loop prevention).
    #[serde(default = "default_redirect_gap_ms")]
    pub redirect_gap_ms: u64,

    /// Injection debounce quiet period.
    #[serde(default = "default_injection_quiet_ms")]
    pub injection_quiet_ms: u64,

    /// Longer quiet period for providers whose scripts overwrite injected
    /// style late.
    #[serde(default = "default_injection_quiet_slow_ms")]
    pub injection_quiet_slow_ms: u64,

    /// Dev/debug switch: let every new-window request through.
    #[serde(default)]
    pub allow_new_windows: bool,
}

impl Default for EnforcementSection {
    fn default() -> Self {
        Self {
            redirect_gap_ms: default_redirect_gap_ms(),
            injection_quiet_ms: default_injection_quiet_ms(),
            injection_quiet_slow_ms: default_injection_quiet_slow_ms(),
            allow_new_windows: false,
        }
    }
}

impl EnforcementSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=10_000).contains(&self.redirect_gap_ms) {
            return Err(HostError::Config(
                "enforcement.redirect_gap_ms must be between 100 and 10000".into(),
            ));
        }
        if !(50..=5_000).contains(&self.injection_quiet_ms) {
            return Err(HostError::Config(
                "enforcement.injection_quiet_ms must be between 50 and 5000".into(),
            ));
        }
        if self.injection_quiet_slow_ms < self.injection_quiet_ms {
            return Err(HostError::Config(
                "enforcement.injection_quiet_slow_ms must not be below injection_quiet_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_redirect_gap_ms() -> u64 {
    800
}
fn default_injection_quiet_ms() -> u64 {
    500
}
fn default_injection_quiet_slow_ms() -> u64 {
    1500
}
