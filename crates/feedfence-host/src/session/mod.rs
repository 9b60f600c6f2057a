//! Provider sessions.
//!
//! One [`ProviderSession`] binds one browsing surface to one provider's
//! compiled rules and wires up every enforcement layer for it. At most one
//! session is active at a time; [`SessionManager::open`] closes the previous
//! one first and refuses to open anything without a policy.
//!
//! Cancelable shell callbacks call [`ProviderSession::decide_navigation`] /
//! [`ProviderSession::decide_new_window`] synchronously; informational
//! events arrive on an mpsc channel pumped by a background task.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use feedfence_policy::CompiledRules;

use crate::config::EnforcementSection;
use crate::error::Result;
use crate::guard::{LoadState, NavDecision, NavigationGuard};
use crate::inject::{scripts, ContentInjector};
use crate::netfilter::RequestFilter;
use crate::providers::{self, Enforcement, ProviderProfile, QuietPeriod};
use crate::rules::RuleCache;
use crate::shell::{BrowserShell, EventKind, ShellEvent, Subscription};
use crate::store::PolicyStore;

const ALL_EVENTS: &[EventKind] = &[
    EventKind::NavigationStarted,
    EventKind::InPageNavigation,
    EventKind::DomReady,
    EventKind::LoadFinished,
    EventKind::LoadFailed,
];

pub struct ProviderSession {
    provider_id: String,
    profile: ProviderProfile,
    shell: Arc<dyn BrowserShell>,
    rules: Arc<CompiledRules>,
    guard: NavigationGuard,
    injector: Arc<ContentInjector>,
    filter: Arc<RequestFilter>,
    allow_new_windows: bool,
    subscriptions: Mutex<Vec<Subscription>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("provider_id", &self.provider_id)
            .field("policy_version", &self.rules.policy_version)
            .finish_non_exhaustive()
    }
}

impl ProviderSession {
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn rules(&self) -> &Arc<CompiledRules> {
        &self.rules
    }

    pub fn load_state(&self) -> LoadState {
        self.guard.state()
    }

    pub fn fallback_cursor(&self) -> usize {
        self.guard.fallback_cursor()
    }

    /// Cancelable pre-navigation callback. Must return before the shell may
    /// proceed, so enforcement side effects are spawned, not awaited.
    pub fn decide_navigation(self: &Arc<Self>, url: &str) -> NavDecision {
        // The dedicated client script owns these providers end to end; the
        // host guard staying silent avoids double redirects.
        if self.profile.enforcement == Enforcement::ClientScript {
            return NavDecision::Allow;
        }

        let decision = self.guard.decide(url);
        if decision == NavDecision::Block {
            tracing::info!(provider = %self.provider_id, %url, "blocked navigation");
            self.shell.stop();
            if let Some(target) = self.guard.enforce_block() {
                self.guard.note_navigation();
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = this.shell.load_url(&target).await {
                        tracing::warn!(provider = %this.provider_id, error = %e, "enforced redirect failed");
                    }
                });
                self.injector.schedule();
            }
        }
        decision
    }

    /// New-window requests never open a window. An allowed target loads in
    /// the existing surface instead; everything else is dropped.
    pub fn decide_new_window(self: &Arc<Self>, url: &str) -> NavDecision {
        if self.allow_new_windows {
            return NavDecision::Allow;
        }
        if self.guard.decide(url) == NavDecision::Allow {
            let this = Arc::clone(self);
            let target = url.to_string();
            tokio::spawn(async move {
                if let Err(e) = this.shell.load_url(&target).await {
                    tracing::warn!(provider = %this.provider_id, error = %e, "in-surface open failed");
                }
            });
        } else {
            tracing::info!(provider = %self.provider_id, %url, "dropped new-window request");
        }
        NavDecision::Block
    }

    /// Informational event handler; runs on the session pump task. Never
    /// returns an error: a lost enforcement action is recovered by the next
    /// signal, a panic would kill the pump.
    pub async fn handle_event(self: &Arc<Self>, event: ShellEvent) {
        match event {
            ShellEvent::NavigationStarted { url, is_main_frame } => {
                if !is_main_frame {
                    return;
                }
                self.guard.note_navigation();
                self.enforce_started(&url).await;
            }
            ShellEvent::InPageNavigation { url, is_main_frame } => {
                if !is_main_frame {
                    return;
                }
                self.enforce_started(&url).await;
                if self.profile.enforcement == Enforcement::HostGuard {
                    self.injector.schedule();
                }
            }
            ShellEvent::DomReady => self.trigger_injection().await,
            ShellEvent::LoadFinished => {
                self.guard.note_settled();
                self.trigger_injection().await;
            }
            ShellEvent::LoadFailed(failure) => {
                if let Some(next) = self.guard.note_load_failed(&failure) {
                    tracing::warn!(
                        provider = %self.provider_id,
                        code = failure.code,
                        description = %failure.description,
                        next = %next,
                        "load failed, advancing fallback"
                    );
                    self.guard.note_navigation();
                    if let Err(e) = self.shell.load_url(&next).await {
                        tracing::warn!(provider = %self.provider_id, error = %e, "fallback load failed");
                    }
                }
            }
        }
    }

    /// Post-start safety net for navigations the cancelable callback could
    /// not stop (or that bypassed it).
    async fn enforce_started(&self, url: &str) {
        if self.profile.enforcement != Enforcement::HostGuard {
            return;
        }
        if self.guard.decide(url) != NavDecision::Block {
            return;
        }
        self.shell.stop();
        if let Some(target) = self.guard.enforce_block() {
            tracing::info!(provider = %self.provider_id, %url, %target, "late block, redirecting");
            self.guard.note_navigation();
            if let Err(e) = self.shell.load_url(&target).await {
                tracing::warn!(provider = %self.provider_id, error = %e, "late redirect failed");
            }
        }
    }

    async fn trigger_injection(self: &Arc<Self>) {
        match self.profile.enforcement {
            Enforcement::HostGuard => self.injector.schedule(),
            Enforcement::ClientScript => {
                if let Err(e) = self.shell.execute_script(scripts::CLIENT_GUARD).await {
                    tracing::warn!(provider = %self.provider_id, error = %e, "client script injection failed");
                }
            }
        }
    }

    /// (Re-)attach the full subscription set and restart the event pump.
    /// Replacing the subscription `Vec` drops the previous registrations.
    pub fn rebind(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.shell.subscribe(ALL_EVENTS, tx);
        if let Ok(mut subs) = self.subscriptions.lock() {
            *subs = vec![subscription];
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.handle_event(event).await;
            }
        });
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(previous) = slot.replace(pump) {
                previous.abort();
            }
        }
    }

    /// Tear the session down: detach listeners, stop the pump, cancel any
    /// pending injection, remove injected style, release the mirrored
    /// network-filter rules.
    pub async fn close(&self) {
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.clear();
        }
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(pump) = slot.take() {
                pump.abort();
            }
        }
        self.injector.cancel_pending();
        self.injector.remove_stale_css().await;
        self.filter.clear_active();
        tracing::info!(provider = %self.provider_id, "session closed");
    }
}

pub struct SessionManager {
    store: Arc<PolicyStore>,
    cache: RuleCache,
    filter: Arc<RequestFilter>,
    enforcement: EnforcementSection,
    active: tokio::sync::Mutex<Option<Arc<ProviderSession>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<PolicyStore>,
        filter: Arc<RequestFilter>,
        enforcement: EnforcementSection,
    ) -> Self {
        Self {
            store,
            cache: RuleCache::new(),
            filter,
            enforcement,
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn filter(&self) -> &Arc<RequestFilter> {
        &self.filter
    }

    /// Open a session for `provider_id` on `shell`, closing the previous one
    /// first. Fails without side effects when no policy is available or the
    /// provider is unknown to the current policy.
    pub async fn open(
        &self,
        provider_id: &str,
        shell: Arc<dyn BrowserShell>,
        target_url: Option<&str>,
    ) -> Result<Arc<ProviderSession>> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.close().await;
        }

        let policy = match self.store.cached().await {
            Ok(policy) => policy,
            Err(_) => self.store.load().await?,
        };
        self.cache.retain_version(&policy.version);
        let rules = self.cache.rules_for(&policy, provider_id)?;
        let profile = providers::profile_for(provider_id);

        if let Some(ua) = profile.user_agent {
            shell.set_user_agent(ua);
        }
        if profile.enforcement == Enforcement::HostGuard {
            self.filter.set_active(rules.clone());
        }

        let quiet = Duration::from_millis(match profile.quiet {
            QuietPeriod::Standard => self.enforcement.injection_quiet_ms,
            QuietPeriod::Extended => self.enforcement.injection_quiet_slow_ms,
        });
        let guard = NavigationGuard::new(
            rules.clone(),
            profile.fallbacks.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(self.enforcement.redirect_gap_ms),
        );
        let injector = Arc::new(ContentInjector::new(shell.clone(), rules.clone(), quiet));

        let session = Arc::new(ProviderSession {
            provider_id: provider_id.to_string(),
            profile,
            shell: shell.clone(),
            rules: rules.clone(),
            guard,
            injector,
            filter: self.filter.clone(),
            allow_new_windows: self.enforcement.allow_new_windows,
            subscriptions: Mutex::new(Vec::new()),
            pump: Mutex::new(None),
        });
        session.rebind();

        // A blocked requested target silently becomes the start URL.
        let initial = match target_url {
            Some(url) if session.guard.decide(url) == NavDecision::Allow => url.to_string(),
            _ => rules.start.clone(),
        };
        session.guard.note_navigation();
        shell.load_url(&initial).await?;
        tracing::info!(provider = %provider_id, start = %initial, "session opened");

        *active = Some(session.clone());
        Ok(session)
    }

    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            session.close().await;
        }
    }
}
