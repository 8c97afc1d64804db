use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::config::{LoaderConfig, ScanErrorPolicy};
use crate::kernel::constants::PLATE_ANNOTATION;
use crate::plugin_system::activation::{ActivationStrategy, ClassPath, LoadingSlot, PluginContext};
use crate::plugin_system::conflict::ConflictManager;
use crate::plugin_system::container::Container;
use crate::plugin_system::dependency::{DependencyResolver, PluginCandidate};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::metadata::{PlateDescriptor, PlateMetadata};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::scanner::{ClassScanner, DescriptorScanner, ScannedClass};
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::Version;

/// A plugin class ready to be instantiated.
#[derive(Debug, Clone)]
pub struct LoadingClass {
    pub container: String,
    pub class_name: String,
    pub metadata: Arc<PlateMetadata>,
    pub activation: ActivationStrategy,
}

impl LoadingClass {
    fn candidate(&self) -> PluginCandidate {
        PluginCandidate::new(Arc::clone(&self.metadata), self.container.clone(), self.class_name.clone())
    }
}

/// Everything guarded by the load lock.
#[derive(Default)]
struct LoaderState {
    registry: PluginRegistry,
    loading: LoadingSlot,
}

/// The load lock with the registry and loading slot it guards.
///
/// Loaders built from clones of one context share a single registry and never
/// construct plugins at the same time. Hosts running several loaders hand
/// them the same context with [`PluginLoader::with_context`].
#[derive(Clone, Default)]
pub struct LoadContext {
    state: Arc<Mutex<LoaderState>>,
}

impl LoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if both handles guard the same state.
    pub fn shares_state_with(&self, other: &LoadContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext").finish_non_exhaustive()
    }
}

/// Discovers, orders and instantiates plugins.
///
/// Instantiation happens one plugin at a time under the lock of the loader's
/// [`LoadContext`], so concurrent loads sharing that context never
/// interleave plugin construction.
pub struct PluginLoader {
    config: LoaderConfig,
    class_path: ClassPath,
    scanner: Arc<dyn ClassScanner>,
    resolver: DependencyResolver,
    runtime_version: Option<Version>,
    context: LoadContext,
}

impl PluginLoader {
    /// A loader with its own [`LoadContext`].
    pub fn new(config: LoaderConfig, class_path: ClassPath) -> Self {
        Self::with_context(config, class_path, LoadContext::new())
    }

    /// A loader sharing the registry and load lock of `context`.
    pub fn with_context(config: LoaderConfig, class_path: ClassPath, context: LoadContext) -> Self {
        let scanner = Arc::new(DescriptorScanner::new(&config));
        let resolver = DependencyResolver::new(config.platform_namespace());
        let runtime_version = config.runtime_version.as_deref().map(Version::parse);
        Self {
            config,
            class_path,
            scanner,
            resolver,
            runtime_version,
            context,
        }
    }

    /// Replaces the class scanner.
    pub fn with_scanner(mut self, scanner: Arc<dyn ClassScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn class_path(&self) -> &ClassPath {
        &self.class_path
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn context(&self) -> &LoadContext {
        &self.context
    }

    /// Public, top-level classes of `container` carrying the plate
    /// annotation, by class name.
    pub async fn scan(&self, container: &dyn Container) -> Result<BTreeMap<String, ScannedClass>, PluginSystemError> {
        let classes = self.scanner.scan(container).await.map_err(|source| PluginSystemError::ContainerIo {
            container: container.name().to_string(),
            source,
        })?;

        let found = classes
            .into_iter()
            .filter(|class| class.is_public && class.is_top_level() && class.annotation(PLATE_ANNOTATION).is_some())
            .map(|class| (class.class_name.clone(), class))
            .collect::<BTreeMap<_, _>>();

        log::debug!("Found {} plugin classes in '{}'", found.len(), container.name());
        Ok(found)
    }

    /// Reads the plate descriptor of each scanned class. Classes without the
    /// annotation are skipped with a warning.
    pub fn describe(
        &self,
        container: &str,
        scanned: &BTreeMap<String, ScannedClass>,
    ) -> Result<Vec<PluginCandidate>, PluginSystemError> {
        let mut candidates = Vec::with_capacity(scanned.len());
        for (class_name, class) in scanned {
            let Some(annotation) = class.annotation(PLATE_ANNOTATION) else {
                log::warn!("The class {class_name} in '{container}' is not annotated with @{PLATE_ANNOTATION}, skipping");
                continue;
            };

            let descriptor: PlateDescriptor =
                serde_json::from_value(annotation.value.clone()).map_err(|e| PluginSystemError::Descriptor {
                    container: container.to_string(),
                    class_name: class_name.clone(),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })?;
            let metadata = PlateMetadata::try_from(descriptor)
                .map_err(|e| PluginSystemError::descriptor(container, class_name, e))?;

            candidates.push(PluginCandidate::new(metadata, container, class_name.clone()));
        }
        Ok(candidates)
    }

    /// Scans every container concurrently and describes the plugin classes
    /// found, in container order.
    pub async fn discover(&self, containers: &[Arc<dyn Container>]) -> Result<Vec<PluginCandidate>, PluginSystemError> {
        let scans = join_all(containers.iter().map(|container| self.scan(container.as_ref()))).await;

        let mut candidates = Vec::new();
        for (container, scanned) in containers.iter().zip(scans) {
            let scanned = match scanned {
                Ok(scanned) => scanned,
                Err(e) if self.config.scan_error_policy == ScanErrorPolicy::Skip => {
                    log::warn!("Skipping container '{}': {}", container.name(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            candidates.extend(self.describe(container.name(), &scanned)?);
        }
        Ok(candidates)
    }

    /// Pairs each candidate with the linked class it came from. Classes
    /// missing from the class path, plain classes and plugin classes with no
    /// way to be instantiated are skipped with a warning.
    pub fn link(&self, candidates: Vec<PluginCandidate>) -> Vec<LoadingClass> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let Some(definition) = self.class_path.get(&candidate.class_name) else {
                    log::warn!(
                        "Failed to load the class {} from '{}', it is not linked, skipping",
                        candidate.class_name,
                        candidate.container
                    );
                    return None;
                };
                if !definition.is_plugin() {
                    log::warn!(
                        "The class {} from '{}' is annotated with @{} but does not implement Plugin, skipping",
                        candidate.class_name,
                        candidate.container,
                        PLATE_ANNOTATION
                    );
                    return None;
                }
                let Some(activation) = ActivationStrategy::select(definition) else {
                    log::warn!(
                        "The plugin class {} from '{}' has no instance, constructor or static accessor, skipping",
                        candidate.class_name,
                        candidate.container
                    );
                    return None;
                };

                Some(LoadingClass {
                    container: candidate.container,
                    class_name: candidate.class_name,
                    metadata: candidate.metadata,
                    activation,
                })
            })
            .collect()
    }

    /// Extracts the loadable plugin classes of one scanned container, by
    /// class name.
    pub fn extract(
        &self,
        container: &str,
        scanned: &BTreeMap<String, ScannedClass>,
    ) -> Result<BTreeMap<String, LoadingClass>, PluginSystemError> {
        let candidates = self.describe(container, scanned)?;
        Ok(self
            .link(candidates)
            .into_iter()
            .map(|class| (class.class_name.clone(), class))
            .collect())
    }

    /// Removes duplicates and sorts `candidates` in load order.
    pub fn plan(&self, candidates: Vec<PluginCandidate>) -> Result<Vec<PluginCandidate>, PluginSystemError> {
        let candidates = ConflictManager::new().deduplicate(candidates)?;
        let order = self.resolver.resolve(&candidates)?;

        let mut by_id: HashMap<String, PluginCandidate> =
            candidates.into_iter().map(|candidate| (candidate.id().to_string(), candidate)).collect();
        order
            .into_iter()
            .map(|id| {
                by_id
                    .remove(&id)
                    .ok_or_else(|| PluginSystemError::InternalError(format!("resolved unknown plugin '{id}'")))
            })
            .collect()
    }

    /// Loads every plugin found in `containers` and returns the instances in
    /// load order.
    ///
    /// Plugins already loaded under the same id are reused. A failure while
    /// instantiating or enabling a plugin stops the batch; plugins enabled
    /// before it stay loaded.
    pub async fn load(&self, containers: &[Arc<dyn Container>]) -> Result<Vec<Arc<dyn Plugin>>, PluginSystemError> {
        let discovered = self.discover(containers).await?;
        let linked = self.link(discovered);

        let ordered = self.plan(linked.iter().map(LoadingClass::candidate).collect())?;

        let mut classes: HashMap<(String, String), LoadingClass> = linked
            .into_iter()
            .map(|class| ((class.container.clone(), class.class_name.clone()), class))
            .collect();

        let mut plugins = Vec::with_capacity(ordered.len());
        for candidate in ordered {
            let class = classes
                .remove(&(candidate.container.clone(), candidate.class_name.clone()))
                .ok_or_else(|| PluginSystemError::InternalError(format!("no linked class for '{}'", candidate.id())))?;
            self.check_runtime(&class.metadata);
            plugins.push(self.instantiate(&class).await?);
        }

        log::info!("Loaded {} plugins", plugins.len());
        Ok(plugins)
    }

    fn check_runtime(&self, metadata: &PlateMetadata) {
        let (Some(host), Some(required)) = (&self.runtime_version, metadata.runtime_requirement()) else {
            return;
        };
        if required.compare(host, true) == Ordering::Greater {
            log::warn!(
                "{} requires runtime {} but the host runs {}, it may not work properly",
                metadata,
                required,
                host
            );
        }
    }

    async fn instantiate(&self, class: &LoadingClass) -> Result<Arc<dyn Plugin>, PluginSystemError> {
        let id = class.metadata.id();
        let mut state = self.context.state.lock().await;

        if let Some(existing) = state.registry.get_plugin(id) {
            log::warn!("The plugin '{id}' is already loaded, reusing it instead of {}", class.class_name);
            return Ok(existing);
        }

        log::info!("Loading {} -- {}", class.metadata, class.class_name);

        let created = {
            let mut context = PluginContext::publish(&mut state.loading, Arc::clone(&class.metadata), &class.class_name);
            class.activation.activate(&mut context)
        };
        let plugin = created.map_err(|source| PluginSystemError::Instantiation {
            plugin_id: id.to_string(),
            class_name: class.class_name.clone(),
            container: class.container.clone(),
            source,
        })?;

        if plugin.id() != id {
            return Err(PluginSystemError::RegistrationError {
                plugin_id: id.to_string(),
                message: format!("the instance of {} reports the id '{}'", class.class_name, plugin.id()),
            });
        }

        state.registry.register_plugin(Arc::clone(&plugin))?;
        if let Err(source) = plugin.enable() {
            state.registry.unregister_plugin(id);
            return Err(PluginSystemError::Enable { plugin_id: id.to_string(), source });
        }
        state.registry.mark_enabled(id);

        Ok(plugin)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.context.state.lock().await.registry.get_plugin(id)
    }

    /// Loaded plugins in load order.
    pub async fn loaded(&self) -> Vec<Arc<dyn Plugin>> {
        self.context.state.lock().await.registry.get_plugins_arc()
    }

    /// Calls the disable hook of a loaded plugin and removes it. The plugin
    /// is removed even when its hook fails.
    pub async fn disable(&self, id: &str) -> Result<(), PluginSystemError> {
        let mut state = self.context.state.lock().await;
        let plugin = state
            .registry
            .unregister_plugin(id)
            .ok_or_else(|| PluginSystemError::NotLoaded(id.to_string()))?;

        log::info!("Disabling {}", plugin.metadata());
        plugin
            .disable()
            .map_err(|source| PluginSystemError::Disable { plugin_id: id.to_string(), source })
    }

    #[cfg(test)]
    pub(crate) async fn loading_slot_is_empty(&self) -> bool {
        self.context.state.lock().await.loading.is_empty()
    }
}
