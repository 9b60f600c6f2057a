//! Content injector.
//!
//! On each load milestone the session schedules an injection pass; bursts of
//! rapid signals collapse into a single pass after a quiet period via a
//! cancel-and-reschedule timer (never a queue, so re-entrant scheduling
//! while a previous pass is pending is safe). A pass removes the previous
//! stylesheet handle, injects the hide stylesheet, serializes the policy
//! config into the page global, and runs the DOM enforcement script.
//! Failures are logged and swallowed; they never escape an event handler.

pub mod scripts;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use feedfence_policy::CompiledRules;

use crate::error::Result;
use crate::shell::{BrowserShell, CssHandle};

/// Name of the page global carrying the serialized policy config.
const POLICY_GLOBAL: &str = "__FF_POLICY";

pub struct ContentInjector {
    shell: Arc<dyn BrowserShell>,
    rules: Arc<CompiledRules>,
    quiet: Duration,
    inserted_css: Mutex<Option<CssHandle>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ContentInjector {
    pub fn new(shell: Arc<dyn BrowserShell>, rules: Arc<CompiledRules>, quiet: Duration) -> Self {
        Self {
            shell,
            rules,
            quiet,
            inserted_css: Mutex::new(None),
            pending: Mutex::new(None),
        }
    }

    /// Cancel-and-reschedule: the pass runs once the signals go quiet.
    pub fn schedule(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.quiet).await;
            this.inject().await;
        });
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn cancel_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    /// One injection pass. Never propagates failures.
    pub async fn inject(&self) {
        if let Err(e) = self.try_inject().await {
            tracing::warn!(provider = %self.rules.provider_id, error = %e, "injection pass failed");
        }
    }

    async fn try_inject(&self) -> Result<()> {
        self.remove_stale_css().await;

        if !self.rules.hide_selectors.is_empty() {
            let css = build_hide_css(&self.rules.hide_selectors);
            let handle = self.shell.insert_css(&css).await?;
            if let Ok(mut inserted) = self.inserted_css.lock() {
                *inserted = Some(handle);
            }
        }

        let config = policy_config_json(&self.rules);
        self.shell
            .execute_script(&format!("window.{POLICY_GLOBAL} = {config};"))
            .await?;
        self.shell.execute_script(scripts::DOM_GUARD).await?;
        Ok(())
    }

    /// Remove the previously injected stylesheet, if any, so rules never
    /// stack across navigations. Removal failures only mean the page is
    /// already gone.
    pub async fn remove_stale_css(&self) {
        let stale = self
            .inserted_css
            .lock()
            .ok()
            .and_then(|mut inserted| inserted.take());
        if let Some(handle) = stale {
            if let Err(e) = self.shell.remove_css(&handle).await {
                tracing::debug!(error = %e, "stale stylesheet removal failed");
            }
        }
    }
}

/// Single stylesheet hiding all selectors; both `display` and `visibility`
/// so late-running site scripts cannot trivially undo one of them.
pub fn build_hide_css(selectors: &[String]) -> String {
    selectors
        .iter()
        .map(|s| format!("{s} {{ display: none !important; visibility: hidden !important; }}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialized configuration object exposed to the in-page script.
pub fn policy_config_json(rules: &CompiledRules) -> String {
    serde_json::json!({
        "allow": rules.allow_patterns,
        "block": rules.block_patterns,
        "hideSelectors": rules.hide_selectors,
        "disableAnchorsTo": rules.disable_anchors_to,
        "start": rules.start,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use feedfence_policy::{compile, parser};

    fn rules() -> CompiledRules {
        let policy = parser::parse_str(
            r#"{
                "version": "1",
                "providers": {
                    "x": {
                        "start": "https://x.com/messages",
                        "allow": ["https://x.com/messages*"],
                        "block": ["https://x.com/*"],
                        "dom": {
                            "hide": ["[data-testid='sidebarColumn']", "section.feed"],
                            "disableAnchorsTo": ["/explore"]
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        compile(&policy, "x", None).unwrap()
    }

    #[test]
    fn hide_css_covers_every_selector() {
        let css = build_hide_css(&rules().hide_selectors);
        assert!(css.contains("[data-testid='sidebarColumn'] { display: none !important;"));
        assert!(css.contains("section.feed { display: none !important;"));
        assert!(css.contains("visibility: hidden !important;"));
    }

    #[test]
    fn config_json_round_trips() {
        let json = policy_config_json(&rules());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["start"], "https://x.com/messages");
        assert_eq!(value["allow"][0], "https://x.com/messages*");
        assert_eq!(value["disableAnchorsTo"][0], "/explore");
        assert_eq!(value["hideSelectors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn guard_scripts_are_embedded() {
        assert!(scripts::DOM_GUARD.contains("__FF_POLICY"));
        assert!(scripts::CLIENT_GUARD.contains("c_user="));
    }

    #[test]
    fn guard_scripts_reapply_after_site_rerenders() {
        assert!(scripts::DOM_GUARD.contains("MutationObserver"));
        assert!(scripts::CLIENT_GUARD.contains("MutationObserver"));
        assert!(scripts::CLIENT_GUARD.contains("ensureStyle"));
    }
}
