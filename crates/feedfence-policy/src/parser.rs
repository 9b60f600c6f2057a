//! Policy document parsing (strict shape validation).
//!
//! Shape errors must fail parsing; a malformed document never degrades into
//! an empty policy that would silently allow everything.

use serde_json::Value;

use crate::error::{PolicyError, Result};
use crate::types::Policy;

/// Parse a policy document from raw JSON text.
pub fn parse_str(raw: &str) -> Result<Policy> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PolicyError::Invalid(format!("not valid JSON: {e}")))?;
    parse_value(value)
}

/// Parse a policy document from a JSON value.
///
/// The signed delivery path wraps the document in a `{ "policy": ... }`
/// envelope; both the wrapped and the bare form are accepted.
pub fn parse_value(value: Value) -> Result<Policy> {
    let doc = match value {
        Value::Object(mut map) if map.contains_key("policy") => map
            .remove("policy")
            .ok_or_else(|| PolicyError::Invalid("empty policy envelope".into()))?,
        other => other,
    };

    let policy: Policy = serde_json::from_value(doc)
        .map_err(|e| PolicyError::Invalid(format!("malformed policy document: {e}")))?;

    if policy.providers.is_empty() {
        return Err(PolicyError::Invalid("policy has no providers".into()));
    }

    Ok(policy)
}
