//! Request path → identifier normalization.
//!
//! An identifier is what is left of a request path once the provider's base
//! URL is stripped and redundant separators are collapsed. Object
//! identifiers are further split into a registry name and a path relative to
//! that registry.

use moldserve_api::{ServeError, ServeResult};
use percent_encoding::percent_decode_str;

/// Strip `base_url` from `path` and collapse empty segments.
///
/// Returns `None` when the path is not under `base_url`; the caller should
/// hand the request to some other handler.
pub fn normalize(path: &str, base_url: &str) -> Option<String> {
    let remainder = path.strip_prefix(base_url)?;
    Some(join_segments(remainder))
}

/// Collapse empty segments of an already prefix-stripped identifier.
pub fn join_segments(raw: &str) -> String {
    raw.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decode a request path or identifier.
///
/// Adapters decode before resolving so `my%20mold` and `my mold` name the
/// same object everywhere. Invalid UTF-8 is replaced, not rejected.
pub fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Split an object identifier into `(registry_name, remainder)`.
pub fn split_registry(identifier: &str) -> ServeResult<(&str, &str)> {
    match identifier.split_once('/') {
        Some((registry, rest)) if !registry.is_empty() && !rest.is_empty() => {
            Ok((registry, rest))
        }
        _ => Err(ServeError::not_found("invalid path")),
    }
}

/// Lexically normalize a request path rooted at `/`.
///
/// `.` and empty segments are dropped, `..` pops a segment but never climbs
/// above the root, and a trailing `/` is kept so directory requests stay
/// distinguishable from file requests.
pub fn normpath(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    normalized.push_str(&segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}
