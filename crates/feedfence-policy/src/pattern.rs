//! Pattern engine: converts policy patterns (glob or raw regex) into
//! anchored `Regex` instances and evaluates them against navigation targets.
//!
//! Two pattern dialects exist on purpose:
//! - navigation patterns (`pattern_to_regex`) accept raw regexes and
//!   path-only globs with query/hash tolerance;
//! - request-filter globs (`glob_to_regex`) are plain `*`/`?` wildcards
//!   matched against the full request URL.

use regex::Regex;
use url::Url;

use crate::error::{PolicyError, Result};

/// Heuristic: a pattern that carries anchors or regex tokens is treated as a
/// raw regular expression instead of a glob.
fn looks_like_regex(pattern: &str) -> bool {
    if pattern.starts_with('^') || pattern.ends_with('$') {
        return true;
    }
    pattern.contains('\\')
        || pattern.contains('(')
        || pattern.contains(')')
        || pattern.contains('[')
        || pattern.contains(']')
        || pattern.contains('{')
        || pattern.contains('}')
        || pattern.contains('|')
        || pattern.contains(".*")
}

/// Escape glob metacharacters, expanding `*` to `.*`. `?` stays literal in
/// the navigation dialect (URLs carry query strings).
fn glob_body(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '-' | '/' | '\\' | '^' | '$' | '+' | '?' | '.' | '(' | ')' | '|' | '[' | ']'
            | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn compile(expr: &str, original: &str) -> Result<Regex> {
    Regex::new(expr)
        .map_err(|e| PolicyError::Invalid(format!("pattern `{original}` did not compile: {e}")))
}

/// Convert a navigation policy pattern into a `Regex`.
///
/// Path-only patterns (`/messages*`) anchor against the path and tolerate an
/// optional trailing slash plus query/hash. Absolute patterns
/// (`https://x.com/messages*`) anchor against the full URL. Bare fragments
/// stay partial matches so host names can be listed directly.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return compile("^$", pattern);
    }

    if looks_like_regex(trimmed) {
        if let Ok(rx) = Regex::new(trimmed) {
            return Ok(rx);
        }
        // invalid raw regex falls through to glob conversion
    }

    let body = glob_body(trimmed);
    let has_scheme = trimmed.contains("://");
    let ends_open = trimmed.ends_with('*');

    let expr = if trimmed.starts_with('/') {
        let body = if ends_open {
            body
        } else {
            format!("{body}(?:\\/)?")
        };
        format!("^{body}(?:[?#].*)?$")
    } else if has_scheme {
        let tail = if ends_open { "" } else { "(?:[?#].*)?" };
        format!("^{body}{tail}$")
    } else if ends_open {
        format!("^{body}$")
    } else {
        body
    };

    compile(&expr, pattern)
}

/// Convert a request-filter glob (`*` spans any run, `?` one character) into
/// an anchored `Regex` matched against the full request URL.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '^' | '$' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('$');
    compile(&out, pattern)
}

/// Build the list of target strings evaluated against allow/block patterns,
/// so a pattern can address the full URL or just a path component.
pub fn navigation_targets(url: &str) -> Vec<String> {
    let mut targets = vec![url.to_string()];
    let mut push = |targets: &mut Vec<String>, t: String| {
        if !targets.contains(&t) {
            targets.push(t);
        }
    };

    if let Ok(parsed) = Url::parse(url) {
        let origin = parsed.origin().ascii_serialization();
        let path = parsed.path().to_string();
        let path_query = match parsed.query() {
            Some(q) => format!("{path}?{q}"),
            None => path.clone(),
        };
        push(&mut targets, format!("{origin}{path}"));
        push(&mut targets, path);
        push(&mut targets, path_query);
        if let Some(host) = parsed.host_str() {
            push(&mut targets, host.to_string());
        }
    }

    targets
}

/// True if any pattern matches any navigation target of `url`.
pub fn matches_any(url: &str, patterns: &[Regex]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let targets = navigation_targets(url);
    patterns
        .iter()
        .any(|rx| targets.iter().any(|t| rx.is_match(t)))
}
