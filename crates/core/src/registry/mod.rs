//! Filesystem-backed registries and the directory they are looked up in.
//!
//! ```text
//! ┌──────────────────────────┐      ┌─────────────────────────┐
//! │ InMemoryRegistryDirectory│─────▶│ MoldRegistry            │
//! │ (name → registry)        │      │ (mold id → directory)   │
//! └──────────────────────────┘      └─────────────────────────┘
//! ```

pub mod directory;
pub mod mold;

pub use directory::InMemoryRegistryDirectory;
pub use mold::MoldRegistry;

/// Registry name used when none is configured.
pub const DEFAULT_REGISTRY_NAME: &str = "nunja.mold";
