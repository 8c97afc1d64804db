#![cfg(test)]

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

use crate::config::{LoaderConfig, ScanErrorPolicy};
use crate::kernel::error::Result;
use crate::plugin_system::activation::{ActivationMode, ClassDefinition, ClassPath};
use crate::plugin_system::container::{Container, DirectoryContainer, MemoryContainer};
use crate::plugin_system::dependency::DependencyError;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{LoadContext, PluginLoader};
use crate::plugin_system::scanner::{Annotation, ClassScanner, ScannedClass};
use crate::plugin_system::tests::fixtures::{TestPlugin, descriptor, header, ids};
use crate::plugin_system::traits::PluginError;

fn class_name(id: &str) -> String {
    format!("com.example.{id}")
}

/// A container holding one plugin class per `(id, relations)`.
fn bundle(name: &str, plugins: &[(&str, serde_json::Value)]) -> Arc<dyn Container> {
    let mut container = MemoryContainer::new(name);
    for (id, relations) in plugins {
        let class = class_name(id);
        container.insert(format!("{}.class.json", class.replace('.', "/")), header(&class, descriptor(id, relations.clone())));
    }
    Arc::new(container)
}

fn constructed(ids: &[&str]) -> ClassPath {
    let mut class_path = ClassPath::new();
    for id in ids {
        class_path.register(ClassDefinition::plugin(class_name(id)).with_constructor(TestPlugin::new));
    }
    class_path
}

#[tokio::test]
async fn test_scan_keeps_public_top_level_plugin_classes() -> Result<()> {
    let container = MemoryContainer::new("bundle")
        .with_entry("a/Economy.class.json", header("a.Economy", descriptor("economy", json!([]))))
        .with_entry("a/Economy$Inner.class.json", header("a.Economy$Inner", descriptor("inner", json!([]))))
        .with_entry(
            "a/Private.class.json",
            json!({ "class": "a.Private", "visibility": "private", "annotations": [{ "type": "plate", "value": descriptor("private", json!([])) }] })
                .to_string(),
        )
        .with_entry("a/Util.class.json", json!({ "class": "a.Util" }).to_string());

    let loader = PluginLoader::new(LoaderConfig::default(), ClassPath::new());
    let scanned = loader.scan(&container).await?;
    assert_eq!(scanned.keys().collect::<Vec<_>>(), ["a.Economy"]);
    Ok(())
}

/// Reports one plugin class per container, named after the container.
struct NamingScanner;

#[async_trait]
impl ClassScanner for NamingScanner {
    async fn scan(&self, container: &dyn Container) -> io::Result<Vec<ScannedClass>> {
        let id = container.name().to_string();
        Ok(vec![ScannedClass {
            class_name: class_name(&id),
            is_public: true,
            annotations: vec![Annotation { kind: "plate".to_string(), value: descriptor(&id, json!([])) }],
            entry: String::new(),
        }])
    }
}

#[tokio::test]
async fn test_custom_scanner() -> Result<()> {
    let loader =
        PluginLoader::new(LoaderConfig::default(), constructed(&["economy"])).with_scanner(Arc::new(NamingScanner));
    let container: Arc<dyn Container> = Arc::new(MemoryContainer::new("economy"));

    let plugins = loader.load(&[container]).await?;
    assert_eq!(ids(&plugins), ["economy"]);
    Ok(())
}

#[tokio::test]
async fn test_extract_skips_unusable_classes() -> Result<()> {
    let container = MemoryContainer::new("bundle")
        .with_entry("a/Economy.class.json", header("a.Economy", descriptor("economy", json!([]))))
        .with_entry("a/Chat.class.json", header("a.Chat", descriptor("chat", json!([]))))
        .with_entry("a/Util.class.json", header("a.Util", descriptor("util", json!([]))))
        .with_entry("a/Abstract.class.json", header("a.Abstract", descriptor("abstract", json!([]))));
    let class_path = ClassPath::new()
        .with_class(ClassDefinition::plugin("a.Economy").with_constructor(TestPlugin::new))
        .with_class(ClassDefinition::plain("a.Util"))
        .with_class(ClassDefinition::plugin("a.Abstract"));

    let loader = PluginLoader::new(LoaderConfig::default(), class_path);
    let scanned = loader.scan(&container).await?;
    assert_eq!(scanned.len(), 4);

    let extracted = loader.extract("bundle", &scanned)?;
    assert_eq!(extracted.keys().collect::<Vec<_>>(), ["a.Economy"]);
    let economy = &extracted["a.Economy"];
    assert_eq!(economy.metadata.id(), "economy");
    assert_eq!(economy.container, "bundle");
    assert_eq!(economy.activation.mode(), ActivationMode::Constructor);
    Ok(())
}

#[tokio::test]
async fn test_invalid_descriptor_fails_extraction() -> Result<()> {
    let container = MemoryContainer::new("bundle").with_entry(
        "a/Bad.class.json",
        header("a.Bad", json!({ "id": "Not Valid", "name": "Bad plugin", "version": "1.0" })),
    );
    let loader = PluginLoader::new(LoaderConfig::default(), ClassPath::new());
    let scanned = loader.scan(&container).await?;

    let err = loader.extract("bundle", &scanned).unwrap_err();
    assert!(matches!(err, PluginSystemError::Descriptor { ref class_name, .. } if class_name == "a.Bad"));
    Ok(())
}

#[tokio::test]
async fn test_load_in_dependency_order() -> Result<()> {
    let container = bundle("bundle", &[
        ("shop", json!([{ "type": "REQUIRED_BEFORE", "id": "economy", "versions": ["^1.0"] }])),
        ("economy", json!([])),
        ("chat", json!([{ "type": "OPTIONAL_AFTER", "id": "shop" }])),
    ]);
    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["shop", "economy", "chat"]));

    let plugins = loader.load(&[container]).await?;
    assert_eq!(ids(&plugins), ["chat", "economy", "shop"]);
    assert_eq!(ids(&loader.loaded().await), ["chat", "economy", "shop"]);
    assert!(loader.get("shop").await.is_some());
    assert!(loader.loading_slot_is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_load_from_directory_container() -> Result<()> {
    let dir = tempdir().expect("Failed to create temp directory");
    std::fs::create_dir_all(dir.path().join("com/example")).expect("Failed to create class directory");
    std::fs::write(
        dir.path().join("com/example/economy.class.json"),
        header(&class_name("economy"), descriptor("economy", json!([]))),
    )
    .expect("Failed to write class header");

    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["economy"]));
    let container: Arc<dyn Container> = Arc::new(DirectoryContainer::new(dir.path()));
    let plugins = loader.load(&[container]).await?;
    assert_eq!(ids(&plugins), ["economy"]);
    Ok(())
}

#[tokio::test]
async fn test_resolution_failures_abort_the_load() {
    let container = bundle("bundle", &[("shop", json!([{ "type": "REQUIRED_BEFORE", "id": "economy" }]))]);
    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["shop"]));

    let err = loader.load(&[container]).await.unwrap_err();
    assert!(matches!(
        err,
        PluginSystemError::DependencyResolution(DependencyError::MissingDependencies(_))
    ));
    assert!(loader.loaded().await.is_empty());
}

#[tokio::test]
async fn test_duplicates_across_containers_abort_the_load() {
    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["economy"]));
    let err = loader
        .load(&[bundle("one.jar", &[("economy", json!([]))]), bundle("two.jar", &[("economy", json!([]))])])
        .await
        .unwrap_err();
    assert!(matches!(err, PluginSystemError::Conflict(_)));
}

#[tokio::test]
async fn test_scan_error_policy() -> Result<()> {
    let missing: Arc<dyn Container> = Arc::new(DirectoryContainer::new("./non_existent_plugin_dir_for_test"));
    let good = bundle("good.jar", &[("economy", json!([]))]);

    let aborting = PluginLoader::new(LoaderConfig::default(), constructed(&["economy"]));
    let err = aborting.load(&[Arc::clone(&missing), Arc::clone(&good)]).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::ContainerIo { .. }));

    let config = LoaderConfig { scan_error_policy: ScanErrorPolicy::Skip, ..LoaderConfig::default() };
    let skipping = PluginLoader::new(config, constructed(&["economy"]));
    let plugins = skipping.load(&[missing, good]).await?;
    assert_eq!(ids(&plugins), ["economy"]);
    Ok(())
}

#[tokio::test]
async fn test_enable_failure_stops_the_batch() {
    let container = bundle("bundle", &[("alpha", json!([])), ("beta", json!([])), ("gamma", json!([]))]);
    let class_path = constructed(&["alpha", "gamma"])
        .with_class(ClassDefinition::plugin(class_name("beta")).with_constructor(TestPlugin::failing));
    let loader = PluginLoader::new(LoaderConfig::default(), class_path);

    let err = loader.load(&[container]).await.unwrap_err();
    assert!(matches!(err, PluginSystemError::Enable { ref plugin_id, .. } if plugin_id == "beta"));
    assert_eq!(ids(&loader.loaded().await), ["alpha"]);
    assert!(loader.get("beta").await.is_none());
    assert!(loader.loading_slot_is_empty().await);
}

#[tokio::test]
async fn test_constructor_failure_names_the_plugin() {
    let container = bundle("bundle", &[("greedy", json!([]))]);
    let class_path = ClassPath::new().with_class(ClassDefinition::plugin(class_name("greedy")).with_constructor(|ctx| {
        ctx.take_metadata()?;
        TestPlugin::new(ctx)
    }));
    let loader = PluginLoader::new(LoaderConfig::default(), class_path);

    let err = loader.load(&[container]).await.unwrap_err();
    let PluginSystemError::Instantiation { plugin_id, class_name, container, source } = err else {
        panic!("expected an instantiation error");
    };
    assert_eq!(plugin_id, "greedy");
    assert_eq!(class_name, "com.example.greedy");
    assert_eq!(container, "bundle");
    assert!(matches!(source, PluginError::InvalidState));
}

#[tokio::test]
async fn test_singletons_survive_reloads() -> Result<()> {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let class_path = ClassPath::new().with_class(ClassDefinition::plugin(class_name("economy")).with_object_instance(
        move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            TestPlugin::new(ctx)
        },
    ));
    let loader = PluginLoader::new(LoaderConfig::default(), class_path);
    let container = bundle("bundle", &[("economy", json!([]))]);

    let first = loader.load(&[Arc::clone(&container)]).await?;
    loader.disable("economy").await?;
    assert!(loader.loaded().await.is_empty());

    let second = loader.load(&[container]).await?;
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_loading_twice_reuses_loaded_plugins() -> Result<()> {
    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["economy"]));
    let container = bundle("bundle", &[("economy", json!([]))]);

    let first = loader.load(&[Arc::clone(&container)]).await?;
    let second = loader.load(&[container]).await?;
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(loader.loaded().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_disable() -> Result<()> {
    let loader = PluginLoader::new(LoaderConfig::default(), constructed(&["economy"]));
    loader.load(&[bundle("bundle", &[("economy", json!([]))])]).await?;

    loader.disable("economy").await?;
    assert!(loader.get("economy").await.is_none());

    let err = loader.disable("economy").await.unwrap_err();
    assert!(matches!(err, PluginSystemError::NotLoaded(ref id) if id == "economy"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_never_interleave_construction() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let names = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
    let mut class_path = ClassPath::new();
    for id in names {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        class_path.register(ClassDefinition::plugin(class_name(id)).with_constructor(move |ctx| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(15));
            let plugin = TestPlugin::new(ctx);
            in_flight.fetch_sub(1, Ordering::SeqCst);
            plugin
        }));
    }
    let loader = Arc::new(PluginLoader::new(LoaderConfig::default(), class_path));

    let first: Vec<Arc<dyn Container>> = vec![bundle("one.jar", &[("alpha", json!([])), ("beta", json!([])), ("gamma", json!([]))])];
    let second: Vec<Arc<dyn Container>> = vec![bundle("two.jar", &[("delta", json!([])), ("epsilon", json!([])), ("zeta", json!([]))])];

    let one = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load(&first).await }
    });
    let two = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load(&second).await }
    });

    let one = one.await.expect("first load panicked").expect("first load failed");
    let two = two.await.expect("second load panicked").expect("second load failed");

    assert_eq!(one.len() + two.len(), names.len());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(loader.loaded().await.len(), names.len());
    for plugin in loader.loaded().await {
        assert!(names.contains(&plugin.metadata().id()));
    }
    assert!(loader.loading_slot_is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_singleton_is_built_once_across_loaders() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let class_path = ClassPath::new().with_class(ClassDefinition::plugin(class_name("alpha")).with_object_instance(
        move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            TestPlugin::new(ctx)
        },
    ));

    let loaders = [
        Arc::new(PluginLoader::new(LoaderConfig::default(), class_path.clone())),
        Arc::new(PluginLoader::new(LoaderConfig::default(), class_path)),
    ];
    assert!(!loaders[0].context().shares_state_with(loaders[1].context()));

    let tasks: Vec<_> = loaders
        .iter()
        .map(|loader| {
            let loader = Arc::clone(loader);
            let containers: Vec<Arc<dyn Container>> = vec![bundle("alpha.jar", &[("alpha", json!([]))])];
            tokio::spawn(async move { loader.load(&containers).await })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        let mut plugins = task.await.expect("load panicked").expect("load failed");
        instances.push(plugins.remove(0));
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&instances[0], &instances[1]));
}

#[tokio::test]
async fn test_loaders_sharing_a_context_share_the_registry() -> Result<()> {
    let context = LoadContext::new();
    let first = PluginLoader::with_context(LoaderConfig::default(), constructed(&["alpha"]), context.clone());
    let second = PluginLoader::with_context(LoaderConfig::default(), constructed(&["alpha"]), context);
    assert!(first.context().shares_state_with(second.context()));

    let loaded = first.load(&[bundle("alpha.jar", &[("alpha", json!([]))])]).await?;
    assert!(second.get("alpha").await.is_some_and(|plugin| Arc::ptr_eq(&plugin, &loaded[0])));

    // the second loader reuses the instance instead of constructing its own
    let reloaded = second.load(&[bundle("other.jar", &[("alpha", json!([]))])]).await?;
    assert!(Arc::ptr_eq(&reloaded[0], &loaded[0]));

    second.disable("alpha").await?;
    assert!(first.loaded().await.is_empty());
    Ok(())
}
