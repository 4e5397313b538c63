//! JSON manifest describing which registries to serve and where their molds
//! live on disk.
//!
//! ```json
//! {
//!     "base_url": "/nunja/",
//!     "registry_names": ["nunja.mold"],
//!     "registries": {
//!         "nunja.mold": {
//!             "packages": { "example.molds": "src/example/molds" },
//!             "molds": { "other.molds/table": "vendor/table" }
//!         }
//!     }
//! }
//! ```
//!
//! Relative directories are resolved against the manifest's own directory.

use crate::error::{CoreError, Result};
use crate::registry::{DEFAULT_REGISTRY_NAME, InMemoryRegistryDirectory, MoldRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySpec {
    /// Package name → directory whose subdirectories are molds.
    pub packages: BTreeMap<String, PathBuf>,
    /// Mold id → directory of that single mold.
    pub molds: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeManifest {
    pub base_url: Option<String>,
    pub registry_names: Vec<String>,
    pub registries: BTreeMap<String, RegistrySpec>,
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl ServeManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Manifest(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text, path.parent())
    }

    pub fn from_json(text: &str, origin: Option<&Path>) -> Result<Self> {
        let mut manifest: ServeManifest = serde_json::from_str(text)?;
        manifest.origin = origin.map(Path::to_path_buf);
        Ok(manifest)
    }

    /// Registries the provider may serve, defaulting to `nunja.mold`.
    pub fn registry_names(&self) -> Vec<String> {
        if self.registry_names.is_empty() {
            vec![DEFAULT_REGISTRY_NAME.to_string()]
        } else {
            self.registry_names.clone()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.origin {
            Some(origin) if path.is_relative() => origin.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Build a registry directory holding every registry of the manifest.
    pub fn build_directory(&self) -> Result<InMemoryRegistryDirectory> {
        let directory = InMemoryRegistryDirectory::new();

        for (name, spec) in &self.registries {
            let mut registry = MoldRegistry::new(name.clone());

            for (package, dir) in &spec.packages {
                let dir = self.resolve(dir);
                registry.add_package(package, &dir).map_err(|e| {
                    CoreError::Manifest(format!(
                        "package '{}' of registry '{}' at '{}': {}",
                        package,
                        name,
                        dir.display(),
                        e
                    ))
                })?;
            }
            for (mold_id, dir) in &spec.molds {
                registry.add_mold(mold_id, self.resolve(dir));
            }

            info!("Registry '{}' loaded with {} molds", name, registry.len());
            directory.register(Arc::new(registry));
        }

        Ok(directory)
    }
}
