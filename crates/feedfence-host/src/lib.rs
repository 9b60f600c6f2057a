//! feedfence host runtime.
//!
//! This crate wires the policy store, rule compiler cache, navigation guard,
//! network request filter, content injector, and provider sessions into the
//! enforcement stack consumed by an embedding browser shell. The shell
//! itself stays behind the [`shell::BrowserShell`] trait; integration tests
//! drive the stack through a mock implementation.

pub mod config;
pub mod error;
pub mod guard;
pub mod inject;
pub mod netfilter;
pub mod providers;
pub mod rules;
pub mod session;
pub mod shell;
pub mod store;

pub use error::{HostError, Result};
