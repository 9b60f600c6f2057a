//! Network request filter.
//!
//! Process-wide singleton consulted once for every outgoing request of the
//! entire browsing context, not only inside the embedded surface. It owns no
//! per-request state and only reads immutable compiled rule sets, so
//! concurrent invocation for independent requests is safe. It must remain
//! correct with zero sessions open.

use std::sync::{Arc, RwLock};

use regex::Regex;
use url::Url;

use feedfence_policy::{CompiledRules, ResourceType};

use crate::error::Result;

/// Outcome for one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Allow,
    Cancel,
    /// Used for main-frame navigations: cancelling one mid-flight can leave
    /// the browser on an error page, redirecting keeps it on a valid page.
    Redirect(String),
}

/// Cross-surface redirect rule for a provider's disallowed sections.
struct CrossSurfaceRule {
    host_suffix: &'static str,
    block: Regex,
    allow: Regex,
    target: &'static str,
}

impl CrossSurfaceRule {
    fn applies(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let on_host = host.eq_ignore_ascii_case(self.host_suffix)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", self.host_suffix));
        if !on_host {
            return false;
        }

        let path_query = match parsed.query() {
            Some(q) => format!("{}?{q}", parsed.path()),
            None => parsed.path().to_string(),
        };
        self.block.is_match(&path_query) && !self.allow.is_match(&path_query)
    }
}

struct ActiveRules {
    rules: Arc<CompiledRules>,
}

pub struct RequestFilter {
    /// Known first-party data endpoints; never blocked so the providers' own
    /// API calls keep working.
    first_party_allow: Vec<Regex>,
    cross_surface: Vec<CrossSurfaceRule>,
    /// Static, provider-independent ad/telemetry deny-list.
    ad_endpoints: Vec<Regex>,
    active: RwLock<Option<ActiveRules>>,
}

impl RequestFilter {
    pub fn new() -> Result<Self> {
        let first_party_allow = compile_all(&[
            r"(?i)^https?://x\.com/i/",
            r"(?i)^https?://twitter\.com/i/",
        ])?;

        let ad_endpoints = compile_all(&[
            r"(?i)googleads\.g\.doubleclick\.net",
            r"(?i)://[^/]*\.doubleclick\.net/",
            r"(?i)://[^/]*\.youtube\.com/pagead/",
            r"(?i)://[^/]*\.youtube\.com/api/stats/ads/",
        ])?;

        let cross_surface = vec![CrossSurfaceRule {
            host_suffix: "facebook.com",
            block: compile_one(
                r"(?i)^/(?:[a-z]{2}(?:_[A-Z]{2})?/)?(?:$|home\.php$|watch(?:/.*)?|videos?(?:/.*)?|reels?(?:/.*)?|stories(?:/.*)?|gaming(?:/.*)?|games(?:/.*)?|feeds?(?:/.*)?|bookmarks?)|^/\?(?:sk|ref|refid)=",
            )?,
            allow: compile_one(
                r"(?i)^/(?:[a-z]{2}(?:_[A-Z]{2})?/)?(?:notifications(?:/.*)?|messages/t/|profile\.php(?:\?.*)?$|settings(?:/.*)?|business(?:/.*)?|pages/.*|composer/.*|me/?$)",
            )?,
            target: "https://www.facebook.com/notifications/",
        }];

        Ok(Self {
            first_party_allow,
            cross_surface,
            ad_endpoints,
            active: RwLock::new(None),
        })
    }

    /// Mirror the active provider's block rules into the filter. Called by
    /// the session layer on open.
    pub fn set_active(&self, rules: Arc<CompiledRules>) {
        if let Ok(mut active) = self.active.write() {
            *active = Some(ActiveRules { rules });
        }
    }

    /// Drop the mirrored provider rules. Static layers keep applying.
    pub fn clear_active(&self) {
        if let Ok(mut active) = self.active.write() {
            *active = None;
        }
    }

    /// Decide one outgoing request. Fixed evaluation order; must stay cheap
    /// enough to sit on the per-request hot path.
    pub fn decide(
        &self,
        url: &str,
        resource_type: ResourceType,
        is_main_frame: bool,
    ) -> FilterDecision {
        // 1. First-party data endpoints short-circuit to Allow.
        if self.first_party_allow.iter().any(|rx| rx.is_match(url)) {
            return FilterDecision::Allow;
        }

        // 2. Cross-surface redirects for disallowed provider sections.
        if is_main_frame {
            for rule in &self.cross_surface {
                if rule.applies(url) {
                    return FilterDecision::Redirect(rule.target.to_string());
                }
            }
        }

        // 3/4. Active provider rules mirrored from policy.
        if let Ok(active) = self.active.read() {
            if let Some(active) = active.as_ref() {
                if resource_type.is_frame() {
                    if active.rules.is_explicitly_blocked(url) {
                        return FilterDecision::Redirect(active.rules.start.clone());
                    }
                } else if active
                    .rules
                    .web_request_filters
                    .iter()
                    .any(|f| f.matches(url, resource_type))
                {
                    return FilterDecision::Cancel;
                }
            }
        }

        // 5. Ad/telemetry endpoints are cancelled outright; these are not
        // navigations, so no redirect is needed.
        if self.ad_endpoints.iter().any(|rx| rx.is_match(url)) {
            return FilterDecision::Cancel;
        }

        FilterDecision::Allow
    }
}

fn compile_one(expr: &str) -> Result<Regex> {
    Regex::new(expr)
        .map_err(|e| crate::error::HostError::Config(format!("bad builtin filter pattern: {e}")))
}

fn compile_all(exprs: &[&str]) -> Result<Vec<Regex>> {
    exprs.iter().map(|e| compile_one(e)).collect()
}
