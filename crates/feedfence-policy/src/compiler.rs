//! Rule compiler: turns a raw policy + provider id into an immutable
//! `CompiledRules` value ready for per-request evaluation.
//!
//! Pure, no I/O. Compiling the same `(policy.version, provider_id)` twice
//! yields matchers with identical decisions, so callers may cache on that
//! pair. All pattern-to-regex work happens here, never at decision time.

use regex::Regex;
use url::Url;

use crate::error::{PolicyError, Result};
use crate::pattern::{glob_to_regex, matches_any, pattern_to_regex};
use crate::types::{Policy, ProviderPolicy, ResourceType};

/// One pre-compiled network filter: URL globs plus the resource types they
/// apply to (`None` means all types).
#[derive(Debug, Clone)]
pub struct NetworkFilterSpec {
    pub url_patterns: Vec<Regex>,
    pub resource_types: Option<Vec<ResourceType>>,
}

impl NetworkFilterSpec {
    /// True if this filter applies to `resource_type` and any glob matches.
    pub fn matches(&self, url: &str, resource_type: ResourceType) -> bool {
        if let Some(types) = &self.resource_types {
            if !types.is_empty() && !types.contains(&resource_type) {
                return false;
            }
        }
        self.url_patterns.iter().any(|rx| rx.is_match(url))
    }
}

/// Immutable, ready-to-evaluate form of one provider's policy.
#[derive(Debug)]
pub struct CompiledRules {
    pub provider_id: String,
    pub policy_version: String,
    pub allow: Vec<Regex>,
    pub block: Vec<Regex>,
    /// Raw pattern sources, re-serialized into the in-page config object.
    pub allow_patterns: Vec<String>,
    pub block_patterns: Vec<String>,
    pub hide_selectors: Vec<String>,
    pub disable_anchors_to: Vec<String>,
    /// Canonical start URL (host override already applied).
    pub start: String,
    pub web_request_filters: Vec<NetworkFilterSpec>,
}

impl CompiledRules {
    /// Allow-precedence navigation check (fail-closed: unmatched URLs are
    /// not considered allowed). The navigation guard layers its own
    /// default-allow on top of `is_explicitly_blocked`.
    pub fn is_navigation_allowed(&self, url: &str) -> bool {
        is_navigation_allowed(url, &self.allow, &self.block)
    }

    /// True if the URL matches a block pattern outright.
    pub fn is_explicitly_blocked(&self, url: &str) -> bool {
        is_explicitly_blocked(url, &self.block)
    }

    /// Sub-resource check: only an explicit block match denies.
    pub fn is_resource_allowed(&self, url: &str) -> bool {
        is_resource_allowed(url, &self.block)
    }
}

/// Allow patterns take precedence so necessary surfaces keep loading even
/// when a broad block pattern also matches.
pub fn is_navigation_allowed(url: &str, allow: &[Regex], block: &[Regex]) -> bool {
    if matches_any(url, allow) {
        return true;
    }
    if matches_any(url, block) {
        return false;
    }
    false
}

pub fn is_explicitly_blocked(url: &str, block: &[Regex]) -> bool {
    matches_any(url, block)
}

pub fn is_resource_allowed(url: &str, block: &[Regex]) -> bool {
    !matches_any(url, block)
}

/// Compile `provider_id`'s policy entry. Fails with `UnknownProvider` when
/// the provider is absent. `start_override` lets the embedding host force a
/// specific landing surface regardless of policy.
pub fn compile(
    policy: &Policy,
    provider_id: &str,
    start_override: Option<&str>,
) -> Result<CompiledRules> {
    let provider = policy
        .providers
        .get(provider_id)
        .ok_or_else(|| PolicyError::UnknownProvider(provider_id.to_string()))?;

    let allow = provider
        .allow
        .iter()
        .map(|p| pattern_to_regex(p))
        .collect::<Result<Vec<_>>>()?;
    let block = provider
        .block
        .iter()
        .map(|p| pattern_to_regex(p))
        .collect::<Result<Vec<_>>>()?;

    let start = start_override.unwrap_or(&provider.start).to_string();
    let dom = provider.dom.clone().unwrap_or_default();
    tracing::trace!(
        provider = provider_id,
        version = %policy.version,
        allow = allow.len(),
        block = block.len(),
        %start,
        "compiled provider rules"
    );

    Ok(CompiledRules {
        provider_id: provider_id.to_string(),
        policy_version: policy.version.clone(),
        allow,
        block,
        allow_patterns: provider.allow.clone(),
        block_patterns: provider.block.clone(),
        hide_selectors: dom.hide,
        disable_anchors_to: dom.disable_anchors_to,
        start,
        web_request_filters: build_request_filters(provider)?,
    })
}

/// Mirror block patterns into request-filter globs. Path-only patterns are
/// absolutised against the start URL's origin so the shell can match them
/// against full request URLs.
fn build_request_filters(provider: &ProviderPolicy) -> Result<Vec<NetworkFilterSpec>> {
    if provider.block.is_empty() {
        return Ok(Vec::new());
    }

    let origin = Url::parse(&provider.start)
        .ok()
        .map(|u| u.origin().ascii_serialization());

    let url_patterns = provider
        .block
        .iter()
        .map(|p| {
            let absolute = if p.starts_with("http") {
                p.clone()
            } else if let Some(origin) = &origin {
                format!("{origin}{p}")
            } else {
                p.clone()
            };
            glob_to_regex(&absolute)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(vec![NetworkFilterSpec {
        url_patterns,
        resource_types: Some(vec![
            ResourceType::MainFrame,
            ResourceType::SubFrame,
            ResourceType::Xhr,
            ResourceType::Script,
            ResourceType::Image,
            ResourceType::Media,
        ]),
    }])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::parser::parse_str;

    fn sample() -> Policy {
        parse_str(
            r#"{
                "version": "7",
                "providers": {
                    "x": {
                        "start": "https://x.com/messages",
                        "allow": ["https://x.com/messages*", "/i/*"],
                        "block": ["https://x.com/*"],
                        "dom": {
                            "hide": ["[data-testid='primaryColumn'] section"],
                            "disableAnchorsTo": ["/explore"]
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn allow_takes_precedence_over_block() {
        let rules = compile(&sample(), "x", None).unwrap();
        assert!(rules.is_navigation_allowed("https://x.com/messages/123"));
        assert!(!rules.is_navigation_allowed("https://x.com/home"));
        assert!(rules.is_explicitly_blocked("https://x.com/home"));
    }

    #[test]
    fn unknown_provider_fails() {
        let err = compile(&sample(), "nope", None).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownProvider(_)));
    }

    #[test]
    fn start_override_wins_over_policy() {
        let rules = compile(&sample(), "x", Some("https://x.com/compose/post")).unwrap();
        assert_eq!(rules.start, "https://x.com/compose/post");
    }

    #[test]
    fn dom_rules_carry_through() {
        let rules = compile(&sample(), "x", None).unwrap();
        assert_eq!(rules.hide_selectors.len(), 1);
        assert_eq!(rules.disable_anchors_to, vec!["/explore".to_string()]);
    }

    #[test]
    fn request_filters_absolutise_path_patterns() {
        let policy = parse_str(
            r#"{
                "version": "1",
                "providers": {
                    "p": {
                        "start": "https://site.example/app",
                        "allow": [],
                        "block": ["/feed*"]
                    }
                }
            }"#,
        )
        .unwrap();
        let rules = compile(&policy, "p", None).unwrap();
        let spec = &rules.web_request_filters[0];
        assert!(spec.matches("https://site.example/feed/home", ResourceType::Xhr));
        assert!(!spec.matches("https://site.example/messages", ResourceType::Xhr));
        // stylesheet not in the filtered type set
        assert!(!spec.matches("https://site.example/feed/home", ResourceType::Stylesheet));
    }

    #[test]
    fn compilation_is_deterministic() {
        let policy = sample();
        let a = compile(&policy, "x", None).unwrap();
        let b = compile(&policy, "x", None).unwrap();
        let urls = [
            "https://x.com/messages/9",
            "https://x.com/home",
            "https://x.com/i/api/graphql",
            "https://elsewhere.example/",
        ];
        for url in urls {
            assert_eq!(a.is_navigation_allowed(url), b.is_navigation_allowed(url));
            assert_eq!(a.is_explicitly_blocked(url), b.is_explicitly_blocked(url));
        }
    }

    #[test]
    fn resource_check_only_blocks_explicit_matches() {
        let rules = compile(&sample(), "x", None).unwrap();
        assert!(rules.is_resource_allowed("https://cdn.example/asset.js"));
        assert!(!rules.is_resource_allowed("https://x.com/home"));
    }
}
