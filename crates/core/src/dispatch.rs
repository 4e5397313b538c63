//! Core/object classification of normalized identifiers.

use crate::identifier;
use moldserve_api::{Provider, ServeResult};

/// Resolve a raw request path against `provider`.
///
/// `None` means the path is not under the provider's base URL. Otherwise the
/// identifier is served from the generated core content when it belongs to
/// the core set, or looked up as an object.
pub fn fetch(provider: &dyn Provider, path: &str) -> Option<ServeResult<String>> {
    let identifier = identifier::normalize(path, provider.base_url())?;
    Some(fetch_identifier(provider, &identifier))
}

/// Resolve an identifier whose base URL prefix was already matched by the
/// hosting framework's router.
pub fn fetch_identifier(provider: &dyn Provider, identifier: &str) -> ServeResult<String> {
    if provider.is_core(identifier) {
        provider.fetch_core(identifier)
    } else {
        provider.fetch_object(identifier)
    }
}

/// Best-guess content type for an identifier, from its extension.
pub fn guess_content_type(identifier: &str) -> String {
    mime_guess::from_path(identifier)
        .first_raw()
        .unwrap_or("text/plain")
        .to_string()
}
