//! Endpoint resolution and the outbound allow-list.
//!
//! Endpoint paths come from the provider's model listing, not from the
//! operator, so the joined URL is checked against a fixed set of suffixes
//! before any request is made. Providers that mirror their path prefix
//! (`/v1` in both base URL and endpoint) get one duplicated segment collapsed.

use super::types::DispatchError;

pub const ALLOWED_SUFFIXES: [&str; 3] = ["v1/chat/completions", "v1/images/generations", "unf/chat/completions"];

const MIRRORED_SEGMENTS: [&str; 2] = ["v1", "unf"];

/// Join `base_url` and `endpoint_path`, collapse a mirrored prefix, and
/// enforce the allow-list.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidEndpoint`] when the resolved URL does not
/// end in an allowed path.
pub fn resolve_endpoint(base_url: &str, endpoint_path: &str) -> Result<String, DispatchError> {
    let base = base_url.trim().trim_end_matches('/');
    let path = endpoint_path.trim();
    let joined = if path.starts_with('/') { format!("{base}{path}") } else { format!("{base}/{path}") };
    let resolved = collapse_mirrored_segments(&joined);

    if is_allowed(&resolved) {
        Ok(resolved)
    } else {
        Err(DispatchError::InvalidEndpoint { url: resolved })
    }
}

/// Replace the first `/v1/v1/` with `/v1/` and the first `/unf/unf/` with `/unf/`.
#[must_use]
pub fn collapse_mirrored_segments(url: &str) -> String {
    let mut out = url.to_string();
    for segment in MIRRORED_SEGMENTS {
        let doubled = format!("/{segment}/{segment}/");
        let single = format!("/{segment}/");
        out = out.replacen(&doubled, &single, 1);
    }
    out
}

/// Allowed suffixes must start on a path-segment boundary.
#[must_use]
pub fn is_allowed(url: &str) -> bool {
    ALLOWED_SUFFIXES.iter().any(|suffix| {
        url.strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('/'))
    })
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;
