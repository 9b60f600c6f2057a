//! Top-level facade crate for feedfence.
//!
//! Re-exports the policy engine and the host runtime so embedders can depend
//! on a single crate.

pub mod policy {
    pub use feedfence_policy::*;
}

pub mod host {
    pub use feedfence_host::*;
}
