use crate::error::ServeResult;
use std::path::PathBuf;
use std::sync::Arc;

/// A named, read-only collection of molds.
///
/// Records map a logical key (the mold id, e.g. `pkg.molds/basic`) to the
/// location backing it. Paths below a record are resolved with
/// [`Registry::verify_path`].
pub trait Registry: Send + Sync {
    /// Name the registry is published under (e.g. `nunja.mold`).
    fn name(&self) -> &str;

    /// All records of this registry.
    fn iter_records(&self) -> Vec<(String, PathBuf)>;

    /// Resolve a registry-relative path to a file on disk.
    ///
    /// Fails with `ServeError::NotFound` when the path does not name an
    /// existing file.
    fn verify_path(&self, relative_path: &str) -> ServeResult<PathBuf>;
}

/// Lookup of registries by name.
pub trait RegistryDirectory: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<dyn Registry>>;
}
