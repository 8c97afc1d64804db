//! # PlateStack Core
//!
//! Plugin loading core for PlateStack game servers: semantic versions and
//! version ranges, plugin relations and metadata, a dependency resolver that
//! computes a total load order, and a loader that discovers plugin classes in
//! containers and brings them up one at a time under a shared load lock.
pub mod config;
pub mod kernel;
pub mod plugin_system;

// Re-export key public types/traits for easier use by the binary and plugins
pub use config::LoaderConfig;
pub use kernel::error::{Error, Result};
pub use plugin_system::{
    DependencyResolver, PlateMetadata, Plugin, PluginLoader, Relation, RelationType, Version,
    VersionRange,
};
