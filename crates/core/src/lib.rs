pub mod dispatch;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod manifest;
pub mod registry;
pub mod rjs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{CoreError, Result};
pub use manifest::ServeManifest;
pub use registry::{DEFAULT_REGISTRY_NAME, InMemoryRegistryDirectory, MoldRegistry};
pub use rjs::RequireJsProvider;
