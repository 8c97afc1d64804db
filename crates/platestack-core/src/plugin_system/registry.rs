use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;

/// Registry of instantiated plugins, kept in load order
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered plugins (using Arc for shared ownership)
    plugins: HashMap<String, Arc<dyn Plugin>>,
    /// Plugin ids in registration order
    order: Vec<String>,
    /// Enabled plugin IDs
    enabled: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its metadata id
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), PluginSystemError> {
        let id = plugin.id().to_string();
        if self.plugins.contains_key(&id) {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: id,
                message: "Plugin already registered".to_string(),
            });
        }

        self.order.push(id.clone());
        self.plugins.insert(id, plugin);
        Ok(())
    }

    /// Unregister a plugin by ID
    pub fn unregister_plugin(&mut self, id: &str) -> Option<Arc<dyn Plugin>> {
        let plugin = self.plugins.remove(id)?;
        self.order.retain(|registered| registered != id);
        self.enabled.remove(id);
        Some(plugin)
    }

    /// Check if a plugin is registered by ID
    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    /// Get a plugin Arc by ID
    pub fn get_plugin(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(id).cloned()
    }

    /// All registered plugins in registration order
    pub fn get_plugins_arc(&self) -> Vec<Arc<dyn Plugin>> {
        self.order.iter().filter_map(|id| self.plugins.get(id).cloned()).collect()
    }

    /// Enabled plugins in registration order
    pub fn get_enabled_plugins_arc(&self) -> Vec<Arc<dyn Plugin>> {
        self.order
            .iter()
            .filter(|id| self.enabled.contains(*id))
            .filter_map(|id| self.plugins.get(id).cloned())
            .collect()
    }

    pub fn plugin_ids(&self) -> &[String] {
        &self.order
    }

    pub fn mark_enabled(&mut self, id: &str) -> bool {
        if !self.plugins.contains_key(id) {
            return false;
        }
        self.enabled.insert(id.to_string())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    /// Get the number of registered plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}
