//! Browser shell boundary.
//!
//! The embedding application owns the actual browsing surface; this module
//! defines the command surface the enforcement stack issues against it and
//! the informational lifecycle events it consumes.
//!
//! Two signal classes exist on purpose:
//! - cancelable callbacks (pre-navigation, new-window, outgoing-request) are
//!   direct synchronous calls into [`crate::session::ProviderSession`] /
//!   [`crate::netfilter::RequestFilter`], because the shell must not proceed
//!   until it has a decision;
//! - informational events flow through an mpsc channel registered via
//!   [`BrowserShell::subscribe`] and are handled by the session task.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque handle to an injected stylesheet, needed to remove it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssHandle(pub String);

/// Shell command failure (page navigated away, script rejected, ...).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ShellError(pub String);

/// Informational lifecycle events emitted by the shell.
#[derive(Debug, Clone)]
pub enum ShellEvent {
    /// A navigation started; too late to cancel from here.
    NavigationStarted { url: String, is_main_frame: bool },
    /// The page URL changed without a full load (client-side routing).
    InPageNavigation { url: String, is_main_frame: bool },
    /// The document became interactive.
    DomReady,
    /// The load finished successfully.
    LoadFinished,
    /// The load failed.
    LoadFailed(LoadFailure),
}

/// A failed load, with the shell's error code.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub code: i32,
    pub description: String,
}

impl LoadFailure {
    /// Explicit aborts (user- or guard-triggered stop) are not genuine
    /// failures and must never advance the fallback chain.
    pub fn is_abort(&self) -> bool {
        self.code == -3
    }
}

/// Event classes a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NavigationStarted,
    InPageNavigation,
    DomReady,
    LoadFinished,
    LoadFailed,
}

/// Active event registration. Dropping it detaches the listener, so a
/// session's subscription set can be torn down by clearing a `Vec`.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Commands the enforcement stack issues against the embedded surface.
#[async_trait]
pub trait BrowserShell: Send + Sync {
    /// Cancel the in-flight load synchronously. An enforced block always
    /// stops the current load before issuing the replacement one, so two
    /// loads never race into the same surface.
    fn stop(&self);

    async fn load_url(&self, url: &str) -> Result<(), ShellError>;

    async fn insert_css(&self, css: &str) -> Result<CssHandle, ShellError>;

    async fn remove_css(&self, handle: &CssHandle) -> Result<(), ShellError>;

    async fn execute_script(&self, script: &str) -> Result<(), ShellError>;

    /// Set the request identity string for the surface.
    fn set_user_agent(&self, user_agent: &str);

    /// Register interest in informational lifecycle events. The shell must
    /// stop delivering once the returned subscription is dropped.
    fn subscribe(
        &self,
        kinds: &[EventKind],
        sink: mpsc::UnboundedSender<ShellEvent>,
    ) -> Subscription;
}
