//! Policy document model (wire contract).
//!
//! A policy is a versioned map of provider entries. Updates are wholesale
//! replacements; there is no partial-merge path anywhere in the system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Versioned policy document.
///
/// Deserialized from JSON delivered over the network or read from a bundled
/// file. Unknown top-level fields are tolerated so older clients survive
/// schema additions; a missing `providers` map is rejected by the parser.
#[derive(Debug, Clone, Deserialize)]
pub struct Policy {
    /// Opaque version string; compiled rules are cached per version.
    pub version: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderPolicy>,
}

/// One provider's allow/block patterns plus DOM suppression rules.
///
/// `allow` and `block` are independent lists; precedence between them is a
/// compiler concern, not stored data.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPolicy {
    /// Canonical start URL for the provider surface.
    pub start: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub block: Vec<String>,
    #[serde(default)]
    pub dom: Option<DomRules>,
}

/// In-page suppression rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomRules {
    /// CSS selectors hidden via an injected stylesheet.
    #[serde(default)]
    pub hide: Vec<String>,
    /// Path patterns whose anchors get click-trapped in the page.
    #[serde(default, rename = "disableAnchorsTo")]
    pub disable_anchors_to: Vec<String>,
}

/// Resource type of an outgoing request, as reported by the browser shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Xhr,
    Media,
    WebSocket,
    Other,
}

impl ResourceType {
    /// Whether this request is a frame navigation (main or sub frame).
    pub fn is_frame(self) -> bool {
        matches!(self, ResourceType::MainFrame | ResourceType::SubFrame)
    }
}
