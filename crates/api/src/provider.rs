use crate::error::{ServeError, ServeResult};
use std::path::PathBuf;

/// The resolution interface consumed by every HTTP adapter.
///
/// A provider owns a base URL, a small fixed set of "core" identifiers
/// whose content it generates itself, and a way to locate every other
/// ("object") identifier.
pub trait Provider: Send + Sync {
    /// Prefix all handled request paths start with (e.g. `/nunja/`).
    fn base_url(&self) -> &str;

    /// Whether `identifier` names one of the generated core resources.
    fn is_core(&self, identifier: &str) -> bool;

    /// Generated content for a core identifier.
    fn fetch_core(&self, identifier: &str) -> ServeResult<String>;

    /// Locate the file backing an object identifier without reading it.
    fn fetch_path(&self, identifier: &str) -> ServeResult<PathBuf>;

    /// Content of an object identifier as text.
    fn fetch_object(&self, identifier: &str) -> ServeResult<String> {
        let path = self.fetch_path(identifier)?;
        std::fs::read_to_string(&path).map_err(|e| {
            ServeError::NotFound(format!("'{}' could not be read: {}", path.display(), e))
        })
    }
}
