//! How plugin classes turn into instances.
//!
//! The host links plugin classes into a [`ClassPath`] before loading. Each
//! plugin class offers up to three ways to obtain its instance; the loader
//! picks one with [`ActivationStrategy::select`] when the class is extracted
//! and runs it while the class metadata is published in the [`LoadingSlot`].
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::plugin_system::metadata::PlateMetadata;
use crate::plugin_system::traits::{Plugin, PluginError, PluginLogger};

/// Produces a plugin instance inside a [`PluginContext`].
pub type PluginConstructor =
    Arc<dyn Fn(&mut PluginContext<'_>) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync>;

fn boxed<P, F>(factory: F) -> PluginConstructor
where
    P: Plugin + 'static,
    F: Fn(&mut PluginContext<'_>) -> Result<P, PluginError> + Send + Sync + 'static,
{
    Arc::new(move |context: &mut PluginContext<'_>| factory(context).map(|plugin| Arc::new(plugin) as Arc<dyn Plugin>))
}

/// Holds the metadata of the plugin being instantiated. Reading it clears it.
#[derive(Debug, Default)]
pub struct LoadingSlot {
    current: Option<Arc<PlateMetadata>>,
}

impl LoadingSlot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// Handed to plugin constructors while their metadata is published.
///
/// Dropping the context clears the slot, so an instance that never reads its
/// metadata does not leak it to the next one.
pub struct PluginContext<'a> {
    slot: &'a mut LoadingSlot,
    class_name: &'a str,
}

impl<'a> PluginContext<'a> {
    /// Publishes `metadata` in `slot` for the duration of the context.
    pub fn publish(slot: &'a mut LoadingSlot, metadata: Arc<PlateMetadata>, class_name: &'a str) -> Self {
        slot.current = Some(metadata);
        Self { slot, class_name }
    }

    /// Takes the published metadata. A second call fails with
    /// [`PluginError::InvalidState`].
    pub fn take_metadata(&mut self) -> Result<Arc<PlateMetadata>, PluginError> {
        self.slot.current.take().ok_or(PluginError::InvalidState)
    }

    pub fn class_name(&self) -> &str {
        self.class_name
    }

    pub fn logger(&self) -> PluginLogger {
        PluginLogger::new(self.class_name)
    }
}

impl Drop for PluginContext<'_> {
    fn drop(&mut self) {
        self.slot.current = None;
    }
}

/// Lazily created instance shared by every load of its class, whichever
/// loader performs the load. The init closure runs at most once: concurrent
/// callers wait on the cell lock and receive the instance the first caller
/// created.
#[derive(Clone)]
pub struct Singleton {
    cell: Arc<Mutex<Option<Arc<dyn Plugin>>>>,
    init: PluginConstructor,
}

impl Singleton {
    fn new(init: PluginConstructor) -> Self {
        Self { cell: Arc::new(Mutex::new(None)), init }
    }

    fn get_or_create(&self, context: &mut PluginContext<'_>) -> Result<Arc<dyn Plugin>, PluginError> {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(instance) = cell.as_ref() {
            return Ok(Arc::clone(instance));
        }
        let created = (self.init)(context)?;
        *cell = Some(Arc::clone(&created));
        Ok(created)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

#[derive(Clone)]
enum ClassKind {
    Plain,
    Plugin {
        object_instance: Option<Singleton>,
        constructor: Option<PluginConstructor>,
        static_accessor: Option<PluginConstructor>,
    },
}

/// A class linked into the host.
#[derive(Clone)]
pub struct ClassDefinition {
    name: String,
    kind: ClassKind,
}

impl ClassDefinition {
    /// A plugin class with no way of being instantiated yet.
    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Plugin { object_instance: None, constructor: None, static_accessor: None },
        }
    }

    /// A class that does not implement [`Plugin`].
    pub fn plain(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ClassKind::Plain }
    }

    /// The class is a singleton object created on first use.
    pub fn with_object_instance<P, F>(mut self, init: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn(&mut PluginContext<'_>) -> Result<P, PluginError> + Send + Sync + 'static,
    {
        if let ClassKind::Plugin { object_instance, .. } = &mut self.kind {
            *object_instance = Some(Singleton::new(boxed(init)));
        }
        self
    }

    /// The class has a public no-argument constructor.
    pub fn with_constructor<P, F>(mut self, constructor: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn(&mut PluginContext<'_>) -> Result<P, PluginError> + Send + Sync + 'static,
    {
        if let ClassKind::Plugin { constructor: slot, .. } = &mut self.kind {
            *slot = Some(boxed(constructor));
        }
        self
    }

    /// The class exposes a static accessor returning its instance.
    pub fn with_static_accessor<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&mut PluginContext<'_>) -> Result<Arc<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        if let ClassKind::Plugin { static_accessor, .. } = &mut self.kind {
            *static_accessor = Some(Arc::new(accessor));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_plugin(&self) -> bool {
        matches!(self.kind, ClassKind::Plugin { .. })
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("is_plugin", &self.is_plugin())
            .field("activation", &ActivationStrategy::select(self).map(|s| s.mode()))
            .finish()
    }
}

/// Classes linked into the host, by fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    classes: HashMap<String, ClassDefinition>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, definition: ClassDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Links a class, replacing any previous definition with the same name.
    pub fn register(&mut self, definition: ClassDefinition) -> Option<ClassDefinition> {
        self.classes.insert(definition.name.clone(), definition)
    }

    pub fn get(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    Singleton,
    Constructor,
    StaticAccessor,
}

/// The way a plugin class is turned into an instance.
#[derive(Clone)]
pub enum ActivationStrategy {
    Singleton(Singleton),
    Constructor(PluginConstructor),
    StaticAccessor(PluginConstructor),
}

impl ActivationStrategy {
    /// Prefers the singleton object, then the constructor, then the static
    /// accessor. `None` for plain classes and plugin classes offering none.
    pub fn select(definition: &ClassDefinition) -> Option<Self> {
        let ClassKind::Plugin { object_instance, constructor, static_accessor } = &definition.kind else {
            return None;
        };

        if let Some(singleton) = object_instance {
            return Some(ActivationStrategy::Singleton(singleton.clone()));
        }
        if let Some(constructor) = constructor {
            return Some(ActivationStrategy::Constructor(Arc::clone(constructor)));
        }
        static_accessor.as_ref().map(|accessor| ActivationStrategy::StaticAccessor(Arc::clone(accessor)))
    }

    pub fn mode(&self) -> ActivationMode {
        match self {
            ActivationStrategy::Singleton(_) => ActivationMode::Singleton,
            ActivationStrategy::Constructor(_) => ActivationMode::Constructor,
            ActivationStrategy::StaticAccessor(_) => ActivationMode::StaticAccessor,
        }
    }

    pub fn activate(&self, context: &mut PluginContext<'_>) -> Result<Arc<dyn Plugin>, PluginError> {
        match self {
            ActivationStrategy::Singleton(singleton) => singleton.get_or_create(context),
            ActivationStrategy::Constructor(constructor) | ActivationStrategy::StaticAccessor(constructor) => {
                constructor(context)
            }
        }
    }
}

impl fmt::Debug for ActivationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActivationStrategy::{:?}", self.mode())
    }
}
