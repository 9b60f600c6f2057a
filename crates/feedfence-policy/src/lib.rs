//! feedfence core: policy document model, pattern engine, and rule compiler.
//!
//! This crate defines the policy wire contract and the pure decision helpers
//! shared by the host runtime and tooling. It intentionally carries no I/O or
//! runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `PolicyError`/`Result` so a malformed
//! policy document can never crash the embedding host.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod compiler;
pub mod error;
pub mod parser;
pub mod pattern;
pub mod types;

pub use compiler::{compile, CompiledRules, NetworkFilterSpec};
pub use error::{PolicyError, Result};
pub use types::{DomRules, Policy, ProviderPolicy, ResourceType};
