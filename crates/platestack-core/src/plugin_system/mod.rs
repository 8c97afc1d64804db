//! # PlateStack Plugin System
//!
//! Everything needed to go from containers full of plugin classes to a set of
//! enabled plugin instances, loaded in an order that honors their relations.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]** and **[`version_range`]**: the loose SemVer superset used
//!   by plugins ([`Version`]) and the predicates relations match versions with
//!   ([`VersionRange`]).
//! - **[`relation`]**: how a plugin relates to another plugin or platform entry
//!   ([`Relation`], [`RelationType`]).
//! - **[`metadata`]**: plugin identity ([`PlateMetadata`]) and the declarative
//!   descriptor it is read from.
//! - **[`namespace`]**: platform entries relations in the `platform` namespace
//!   are checked against.
//! - **[`conflict`]**: detection of plugin ids declared more than once.
//! - **[`dependency`]**: the [`DependencyResolver`] computing the load order.
//! - **[`container`]** and **[`scanner`]**: where plugin classes are found and
//!   how their headers are read.
//! - **[`activation`]**: the host's linked classes and how each plugin class
//!   becomes an instance.
//! - **[`loader`]**: the [`PluginLoader`] driving scan, resolution and
//!   instantiation under the load lock.
//! - **[`registry`]**: the loaded plugins.
//! - **[`traits`]**: the [`Plugin`] trait and the helpers plugins are built on.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod activation;
pub mod conflict;
pub mod container;
pub mod dependency;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod namespace;
pub mod registry;
pub mod relation;
pub mod scanner;
pub mod traits;
pub mod version;
pub mod version_range;

pub use activation::{ActivationStrategy, ClassDefinition, ClassPath, PluginContext};
pub use container::{Container, DirectoryContainer, MemoryContainer};
pub use dependency::{DependencyError, DependencyResolver, PluginCandidate};
pub use error::PluginSystemError;
pub use loader::{LoadContext, PluginLoader};
pub use metadata::{Library, MetadataBuilder, PlateMetadata};
pub use namespace::PlatformNamespace;
pub use registry::PluginRegistry;
pub use relation::{Relation, RelationType};
pub use traits::{Plugin, PluginBase, PluginError, PluginLogger};
pub use version::{Version, VersionError};
pub use version_range::VersionRange;

#[cfg(test)]
mod tests;
