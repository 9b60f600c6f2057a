//! Navigation guard.
//!
//! Per-session state machine deciding every attempted navigation of the
//! embedded surface. Three independent shell signals (cancelable
//! pre-navigation, post-navigation-start, same-document navigation) all
//! funnel into the same [`NavigationGuard::decide`] so they can never
//! disagree about the same URL.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use feedfence_policy::CompiledRules;

use crate::shell::LoadFailure;

/// Outcome of a navigation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDecision {
    Allow,
    Block,
}

/// Load lifecycle of the surface; re-enters `Loading` on every navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Settled,
}

/// Minimum-time-gap gate between enforced redirects.
///
/// Loop prevention is a time gate, not a counter: a repeated block inside
/// the gap is simply not re-acted upon.
#[derive(Debug)]
pub struct RedirectGate {
    gap: Duration,
    last: Mutex<Option<Instant>>,
}

impl RedirectGate {
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            last: Mutex::new(None),
        }
    }

    /// True when enough time has passed since the previous enforced
    /// redirect; passing records the new one.
    pub fn try_pass(&self) -> bool {
        // Poisoned mutex means a logic bug; treat as "closed" instead of panic.
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        let now = Instant::now();
        match *last {
            Some(prev) if now.duration_since(prev) < self.gap => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Ordered fallback targets for providers with brittle markup. The cursor
/// advances only on genuine load failures and clamps at the last entry.
#[derive(Debug)]
pub struct FallbackChain {
    urls: Vec<String>,
    cursor: usize,
}

impl FallbackChain {
    /// An empty list degenerates to the single `default_url`.
    pub fn new(urls: Vec<String>, default_url: &str) -> Self {
        let urls = if urls.is_empty() {
            vec![default_url.to_string()]
        } else {
            urls
        };
        Self { urls, cursor: 0 }
    }

    pub fn current(&self) -> &str {
        &self.urls[self.cursor.min(self.urls.len() - 1)]
    }

    pub fn advance(&mut self) -> &str {
        if self.cursor + 1 < self.urls.len() {
            self.cursor += 1;
        }
        self.current()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

pub struct NavigationGuard {
    rules: Arc<CompiledRules>,
    state: Mutex<LoadState>,
    gate: RedirectGate,
    fallback: Mutex<FallbackChain>,
}

impl NavigationGuard {
    pub fn new(rules: Arc<CompiledRules>, fallbacks: Vec<String>, redirect_gap: Duration) -> Self {
        let fallback = FallbackChain::new(fallbacks, &rules.start);
        Self {
            rules,
            state: Mutex::new(LoadState::Idle),
            gate: RedirectGate::new(redirect_gap),
            fallback: Mutex::new(fallback),
        }
    }

    /// Fixed-order decision: an allow match wins regardless of block rules;
    /// an explicit block match loses; everything else is allowed. Policies
    /// are blocklists with allow-list carve-outs, not default-deny.
    pub fn decide(&self, url: &str) -> NavDecision {
        if self.rules.is_navigation_allowed(url) {
            return NavDecision::Allow;
        }
        if self.rules.is_explicitly_blocked(url) {
            return NavDecision::Block;
        }
        NavDecision::Allow
    }

    /// Whether to act on a block right now, and where to send the surface.
    /// `None` while inside the redirect gap.
    pub fn enforce_block(&self) -> Option<String> {
        if !self.gate.try_pass() {
            return None;
        }
        self.fallback
            .lock()
            .ok()
            .map(|chain| chain.current().to_string())
    }

    /// A genuine load failure advances the fallback cursor and returns the
    /// next target; explicit aborts never do.
    pub fn note_load_failed(&self, failure: &LoadFailure) -> Option<String> {
        if failure.is_abort() {
            return None;
        }
        let mut chain = self.fallback.lock().ok()?;
        Some(chain.advance().to_string())
    }

    pub fn note_navigation(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LoadState::Loading;
        }
    }

    pub fn note_settled(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LoadState::Settled;
        }
    }

    pub fn state(&self) -> LoadState {
        self.state.lock().map(|s| *s).unwrap_or(LoadState::Idle)
    }

    pub fn fallback_cursor(&self) -> usize {
        self.fallback.lock().map(|c| c.cursor()).unwrap_or(0)
    }
}
