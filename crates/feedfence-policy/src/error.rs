//! Shared error type across feedfence crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Unified policy-layer error.
///
/// `Unavailable` is terminal for opening a provider but recoverable on the
/// next attempt; `Invalid` means the previous good policy (if any) must be
/// kept rather than replaced.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no policy available")]
    Unavailable,
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}
