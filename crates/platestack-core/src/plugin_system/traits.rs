use std::fmt;
use std::sync::Arc;

use log::Level;
use thiserror::Error;

use crate::kernel::constants::PLATE_NAMESPACE;
use crate::plugin_system::activation::PluginContext;
use crate::plugin_system::metadata::PlateMetadata;
use crate::plugin_system::version::Version;

/// Error returned by plugin code
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin construction failed: {0}")]
    Construction(String),

    #[error("Plugin enable failed: {0}")]
    Enable(String),

    #[error("Plugin disable failed: {0}")]
    Disable(String),

    /// A plugin instance was created while no metadata was published,
    /// either outside of a load or by reading the metadata twice.
    #[error("Attempted to create a plugin instance outside of a load, no metadata is available")]
    InvalidState,

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Core trait that all plugins must implement
pub trait Plugin: Send + Sync {
    /// Metadata handed to the plugin when it was instantiated
    fn metadata(&self) -> &PlateMetadata;

    fn id(&self) -> &str {
        self.metadata().id()
    }

    fn name(&self) -> &str {
        self.metadata().name()
    }

    fn version(&self) -> &Version {
        self.metadata().version()
    }

    fn namespace(&self) -> &str {
        PLATE_NAMESPACE
    }

    /// Called once the plugin is registered
    fn enable(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called before the plugin is removed from the registry
    fn disable(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id())
            .field("version", &self.version().to_string())
            .finish()
    }
}

/// Logger bound to a plugin class; records go through the `log` facade with
/// the class name as target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLogger {
    target: String,
}

impl PluginLogger {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn log(&self, level: Level, message: fmt::Arguments<'_>) {
        log::log!(target: self.target.as_str(), level, "{}", message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, format_args!("{message}"));
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, format_args!("{message}"));
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, format_args!("{message}"));
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, format_args!("{message}"));
    }
}

/// State every plugin carries: the metadata it was created with and its
/// logger. Build it from the [`PluginContext`] passed to the constructor.
#[derive(Debug, Clone)]
pub struct PluginBase {
    metadata: Arc<PlateMetadata>,
    logger: PluginLogger,
}

impl PluginBase {
    pub fn new(context: &mut PluginContext<'_>) -> Result<Self, PluginError> {
        let metadata = context.take_metadata()?;
        Ok(Self { metadata, logger: context.logger() })
    }

    pub fn metadata(&self) -> &PlateMetadata {
        &self.metadata
    }

    pub fn shared_metadata(&self) -> Arc<PlateMetadata> {
        Arc::clone(&self.metadata)
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.logger
    }
}
