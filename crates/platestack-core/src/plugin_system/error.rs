//! # PlateStack Plugin System Errors
//!
//! [`PluginSystemError`] covers everything that can go wrong while loading
//! plugins: unreadable containers, invalid descriptors, duplicate ids,
//! unresolvable relations and failures raised by plugin code itself.
use crate::plugin_system::conflict::ConflictError;
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::traits::PluginError;
use crate::plugin_system::version::VersionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Container '{container}' could not be read: {source}")]
    ContainerIo {
        container: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plate descriptor on '{class_name}' in '{container}': {message}")]
    Descriptor {
        container: String,
        class_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Dependency resolution failed: {0}")]
    DependencyResolution(#[from] DependencyError),

    #[error("Plugin conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Plugin '{plugin_id}' ({class_name} in '{container}') could not be instantiated: {source}")]
    Instantiation {
        plugin_id: String,
        class_name: String,
        container: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin '{plugin_id}' failed to enable: {source}")]
    Enable {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin '{plugin_id}' failed to disable: {source}")]
    Disable {
        plugin_id: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin registration error for '{plugin_id}': {message}")]
    RegistrationError { plugin_id: String, message: String },

    #[error("Plugin '{0}' is not loaded")]
    NotLoaded(String),

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

impl PluginSystemError {
    pub(crate) fn descriptor(container: &str, class_name: &str, error: VersionError) -> Self {
        PluginSystemError::Descriptor {
            container: container.to_string(),
            class_name: class_name.to_string(),
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}
