//! RequireJS backed provider.
//!
//! Serves two generated core resources next to the registry objects:
//! `config.js`, a UMD module exporting the RequireJS configuration (a
//! `paths` entry per registry record), and `init.js`, the bootstrap that
//! loads the top-level module. Intended for development servers; production
//! setups should restrict the registries to `nunja.mold`.

use crate::error::Result;
use crate::identifier;
use crate::registry::DEFAULT_REGISTRY_NAME;
use moldserve_api::{Provider, RegistryDirectory, ServeError, ServeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CONFIG_JS: &str = "config.js";
pub const INIT_JS: &str = "init.js";

pub const UMD_JSON_EXPORT_HEADER: &str = "(function() {\n    'use strict';\n\n    var config = ";

pub const UMD_JSON_EXPORT_FOOTER: &str = ";

    if (typeof module === 'object' && module.exports) {
        module.exports = config;
    }
    else if (typeof define === 'function' && define.amd) {
        define([], function() {
            return config;
        });
    }
    else if (typeof requirejs === 'function') {
        requirejs.config(config);
    }
}());
";

pub const INIT_SCRIPT: &str = "'use strict';

require(['nunja/index'], function(nunja) {
    nunja.init();
});
";

/// RequireJS configuration exported by `config.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequireJsConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    pub paths: BTreeMap<String, String>,
}

/// Build the configuration for `registry_names`, in order.
///
/// A record key seen in more than one registry points at the last registry
/// listing it. Registry names the directory does not know are skipped with
/// a warning.
pub fn make_config<S: AsRef<str>>(
    directory: &dyn RegistryDirectory,
    base_url: &str,
    registry_names: &[S],
) -> RequireJsConfig {
    let mut paths = BTreeMap::new();

    for name in registry_names {
        let name = name.as_ref();
        let Some(registry) = directory.get(name) else {
            warn!("registry '{}' does not exist", name);
            continue;
        };

        for (key, _) in registry.iter_records() {
            let value = format!("{}/{}", name, key);
            paths.insert(key, value);
        }
    }

    RequireJsConfig {
        base_url: base_url.to_string(),
        paths,
    }
}

/// Serialize `config` between the UMD header and footer.
pub fn render_config(config: &RequireJsConfig) -> Result<String> {
    let mut json = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
    config.serialize(&mut serializer)?;
    let json = String::from_utf8_lossy(&json);

    Ok(format!(
        "{}{}{}",
        UMD_JSON_EXPORT_HEADER, json, UMD_JSON_EXPORT_FOOTER
    ))
}

/// Provider serving the RequireJS core resources and registry objects.
pub struct RequireJsProvider {
    base_url: String,
    registry_names: Vec<String>,
    directory: Arc<dyn RegistryDirectory>,
    config: RequireJsConfig,
    core: BTreeMap<&'static str, String>,
}

impl RequireJsProvider {
    /// Provider over the default `nunja.mold` registry only.
    pub fn new(base_url: impl Into<String>, directory: Arc<dyn RegistryDirectory>) -> Result<Self> {
        Self::with_registries(base_url, vec![DEFAULT_REGISTRY_NAME.to_string()], directory)
    }

    pub fn with_registries(
        base_url: impl Into<String>,
        registry_names: Vec<String>,
        directory: Arc<dyn RegistryDirectory>,
    ) -> Result<Self> {
        let base_url = base_url.into();
        let config = make_config(directory.as_ref(), &base_url, &registry_names);

        let mut core = BTreeMap::new();
        core.insert(CONFIG_JS, render_config(&config)?);
        core.insert(INIT_JS, INIT_SCRIPT.to_string());

        debug!(
            "RequireJS provider at '{}' over registries {:?} ({} paths)",
            base_url,
            registry_names,
            config.paths.len()
        );

        Ok(Self {
            base_url,
            registry_names,
            directory,
            config,
            core,
        })
    }

    pub fn config(&self) -> &RequireJsConfig {
        &self.config
    }

    pub fn registry_names(&self) -> &[String] {
        &self.registry_names
    }

    pub fn core_subpaths(&self) -> impl Iterator<Item = &str> + '_ {
        self.core.keys().copied()
    }
}

impl Provider for RequireJsProvider {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn is_core(&self, identifier: &str) -> bool {
        self.core.contains_key(identifier)
    }

    fn fetch_core(&self, identifier: &str) -> ServeResult<String> {
        self.core.get(identifier).cloned().ok_or_else(|| {
            ServeError::Internal(format!("'{}' is not a core resource", identifier))
        })
    }

    fn fetch_path(&self, identifier: &str) -> ServeResult<PathBuf> {
        let (registry_name, mold_id_path) = identifier::split_registry(identifier)?;

        if !self.registry_names.iter().any(|name| name == registry_name) {
            return Err(ServeError::not_found(format!(
                "registry '{}' unavailable",
                registry_name
            )));
        }

        let registry = self.directory.get(registry_name).ok_or_else(|| {
            ServeError::not_found(format!("registry '{}' not found", registry_name))
        })?;

        registry.verify_path(mold_id_path)
    }
}
