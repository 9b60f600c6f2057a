//! In-page enforcement scripts, embedded at compile time.

/// Generic DOM enforcement: reads the injected policy config, traps anchor
/// clicks, patches the history API, and redirects client-side navigations
/// the host process cannot see in time.
pub const DOM_GUARD: &str = include_str!("../../assets/dom_guard.js");

/// Dedicated self-contained script for the client-script-enforced provider.
pub const CLIENT_GUARD: &str = include_str!("../../assets/client_guard.js");
