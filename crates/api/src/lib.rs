pub mod error;
pub mod provider;
pub mod registry;

pub use error::{ServeError, ServeResult};
pub use provider::Provider;
pub use registry::{Registry, RegistryDirectory};
