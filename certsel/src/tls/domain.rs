//! Domain key handling
//!
//! Keys are case-insensitive. A key is a wildcard key when it starts with `*.`.
//! `*.example.com` covers any name ending in `.example.com`, including multi-label
//! prefixes like `a.b.example.com`, but never the bare `example.com`.

use std::borrow::Cow;

/// Lower-case a domain name, borrowing when it already is
pub fn normalize_domain(domain: &str) -> Cow<'_, str> {
    if domain.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(domain.to_ascii_lowercase())
    } else {
        Cow::Borrowed(domain)
    }
}

/// Check if a key is a wildcard key (`*.suffix`)
pub fn is_wildcard_key(key: &str) -> bool {
    key.starts_with("*.")
}

/// Check if a normalized domain name falls under a normalized wildcard key.
///
/// Non-wildcard keys never match here; exact keys are looked up directly.
pub fn matches_wildcard(key: &str, domain: &str) -> bool {
    match key.strip_prefix('*') {
        Some(suffix) if suffix.starts_with('.') => domain.ends_with(suffix),
        _ => false,
    }
}
