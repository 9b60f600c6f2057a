//! Host-side error surface.

use thiserror::Error;

use feedfence_policy::PolicyError;

/// Shared result type for the host crate.
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors produced by the enforcement runtime.
///
/// Policy-layer failures pass through unchanged so callers can distinguish
/// "no policy available" (refuse to open a provider) from transport issues.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("config error: {0}")]
    Config(String),
    #[error("policy fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("shell command failed: {0}")]
    Shell(#[from] crate::shell::ShellError),
}
