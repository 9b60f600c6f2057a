//! Provider profiles.
//!
//! Each provider declares which enforcement layers apply to it through a
//! capability tag instead of string comparisons scattered through the
//! session path. Unknown providers get the generic profile and are fully
//! policy-driven.

/// Which layer enforces this provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforcement {
    /// Navigation guard + network filter + injected DOM suppression.
    HostGuard,
    /// A dedicated self-contained client script does the work in-page; the
    /// host-level guard stays out of the way.
    ClientScript,
}

/// How long the injection debounce waits for the page to go quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuietPeriod {
    Standard,
    /// For providers whose scripts overwrite injected style late.
    Extended,
}

/// Host-side knowledge about one provider integration.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub enforcement: Enforcement,
    pub quiet: QuietPeriod,
    /// Forces a specific landing surface regardless of policy.
    pub start_override: Option<&'static str>,
    /// Ordered fallback targets; the cursor advances on genuine load
    /// failures. Empty means "use the compiled start URL".
    pub fallbacks: &'static [&'static str],
    /// Request identity string, when the enforced surface is not the
    /// provider's default one (e.g. mobile web).
    pub user_agent: Option<&'static str>,
}

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

const GENERIC: ProviderProfile = ProviderProfile {
    enforcement: Enforcement::HostGuard,
    quiet: QuietPeriod::Standard,
    start_override: None,
    fallbacks: &[],
    user_agent: None,
};

/// Look up the profile for a provider id.
pub fn profile_for(provider_id: &str) -> ProviderProfile {
    match provider_id {
        "instagram" => ProviderProfile {
            quiet: QuietPeriod::Extended,
            fallbacks: &["https://www.instagram.com/direct/inbox/"],
            ..GENERIC
        },
        "x" => ProviderProfile {
            quiet: QuietPeriod::Extended,
            fallbacks: &["https://x.com/messages"],
            ..GENERIC
        },
        // YouTube markup is brittle; walk a list of safe surfaces instead of
        // retrying a single one.
        "youtube" => ProviderProfile {
            start_override: Some("https://m.youtube.com/feed/subscriptions"),
            fallbacks: &[
                "https://m.youtube.com/feed/subscriptions",
                "https://m.youtube.com/feed/library",
                "https://studio.youtube.com/",
            ],
            user_agent: Some(MOBILE_UA),
            ..GENERIC
        },
        "tiktok" => ProviderProfile {
            fallbacks: &["https://www.tiktok.com/upload"],
            ..GENERIC
        },
        "facebook" => ProviderProfile {
            enforcement: Enforcement::ClientScript,
            fallbacks: &["https://m.facebook.com/messages/"],
            user_agent: Some(MOBILE_UA),
            ..GENERIC
        },
        _ => GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_gets_generic_profile() {
        let p = profile_for("somewhere-new");
        assert_eq!(p.enforcement, Enforcement::HostGuard);
        assert!(p.fallbacks.is_empty());
        assert!(p.start_override.is_none());
    }

    #[test]
    fn client_script_provider_is_tagged() {
        assert_eq!(profile_for("facebook").enforcement, Enforcement::ClientScript);
    }

    #[test]
    fn brittle_provider_has_ordered_fallback_list() {
        assert!(profile_for("youtube").fallbacks.len() > 1);
    }
}
