use moldserve_api::Provider;
use moldserve_core::{RequireJsProvider, ServeManifest};
use std::sync::Arc;

/// Base URL used when the manifest does not name one.
pub const DEFAULT_BASE_URL: &str = "/nunja/";

/// Bootstraps the RequireJS provider described by `manifest`.
///
/// Every registry listed in the manifest is built and registered; the
/// provider is then restricted to the manifest's registry names. Names
/// with no registry behind them are reported while building the config.
pub fn build_default_provider(
    manifest: &ServeManifest,
) -> moldserve_core::Result<Arc<dyn Provider>> {
    let directory = manifest.build_directory()?;
    tracing::info!("Registries configured: {:?}", directory.names());

    let base_url = manifest.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let provider =
        RequireJsProvider::with_registries(base_url, manifest.registry_names(), Arc::new(directory))?;
    Ok(Arc::new(provider))
}

/// Initializes the logging system for a specific component.
/// This delegates to the core logging module.
pub fn init_logging(component: &str, to_stderr: bool) -> Option<impl Drop> {
    Some(moldserve_core::logging::init_logging(component, to_stderr))
}
