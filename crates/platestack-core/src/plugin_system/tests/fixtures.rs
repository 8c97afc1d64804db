#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use crate::plugin_system::activation::PluginContext;
use crate::plugin_system::dependency::PluginCandidate;
use crate::plugin_system::metadata::{MetadataBuilder, PlateMetadata};
use crate::plugin_system::relation::{Relation, RelationType};
use crate::plugin_system::traits::{Plugin, PluginBase, PluginError};
use crate::plugin_system::version::Version;
use crate::plugin_system::version_range::VersionRange;

/// Metadata for `id` at `version` with a generated display name.
pub fn metadata_at(id: &str, version: &str, relations: Vec<Relation>) -> PlateMetadata {
    MetadataBuilder::new(id, format!("{id} plugin"), Version::parse(version))
        .relations(relations)
        .build()
        .expect("valid test metadata")
}

pub fn metadata(id: &str, relations: Vec<Relation>) -> PlateMetadata {
    metadata_at(id, "1.0.0", relations)
}

pub fn candidate(id: &str, container: &str, relations: Vec<Relation>) -> PluginCandidate {
    PluginCandidate::new(metadata(id, relations), container, format!("com.example.{id}"))
}

pub fn plate(kind: RelationType, id: &str) -> Relation {
    Relation::plate(kind, id)
}

pub fn plate_in(kind: RelationType, id: &str, constraint: &str) -> Relation {
    let range = VersionRange::parse_dynamic(constraint).expect("valid constraint");
    Relation::new(kind, id, "plate", vec![range]).expect("valid relation")
}

/// A `plate` descriptor as found in a class header.
pub fn descriptor(id: &str, relations: Value) -> Value {
    json!({
        "id": id,
        "name": format!("{id} plugin"),
        "version": "1.0.0",
        "relations": relations,
    })
}

/// A JSON class header for `class` annotated with `descriptor`.
pub fn header(class: &str, descriptor: Value) -> Vec<u8> {
    json!({
        "class": class,
        "annotations": [{ "type": "plate", "value": descriptor }],
    })
    .to_string()
    .into_bytes()
}

/// Plugin counting its enable and disable calls.
pub struct TestPlugin {
    base: PluginBase,
    pub enabled: AtomicUsize,
    pub disabled: AtomicUsize,
    fail_enable: bool,
}

impl TestPlugin {
    pub fn new(context: &mut PluginContext<'_>) -> Result<Self, PluginError> {
        Ok(Self {
            base: PluginBase::new(context)?,
            enabled: AtomicUsize::new(0),
            disabled: AtomicUsize::new(0),
            fail_enable: false,
        })
    }

    pub fn failing(context: &mut PluginContext<'_>) -> Result<Self, PluginError> {
        let mut plugin = Self::new(context)?;
        plugin.fail_enable = true;
        Ok(plugin)
    }
}

impl Plugin for TestPlugin {
    fn metadata(&self) -> &PlateMetadata {
        self.base.metadata()
    }

    fn enable(&self) -> Result<(), PluginError> {
        if self.fail_enable {
            return Err(PluginError::Enable("refusing to start".to_string()));
        }
        self.enabled.fetch_add(1, Ordering::SeqCst);
        self.base.logger().info("enabled");
        Ok(())
    }

    fn disable(&self) -> Result<(), PluginError> {
        self.disabled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn ids(plugins: &[Arc<dyn Plugin>]) -> Vec<String> {
    plugins.iter().map(|plugin| plugin.id().to_string()).collect()
}
