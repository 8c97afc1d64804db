#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::plugin_system::activation::{
    ActivationMode, ActivationStrategy, ClassDefinition, ClassPath, LoadingSlot, PluginContext,
};
use crate::plugin_system::tests::fixtures::{TestPlugin, metadata};
use crate::plugin_system::traits::{Plugin, PluginBase, PluginError};

#[test]
fn test_strategy_priority() {
    let all = ClassDefinition::plugin("com.example.All")
        .with_static_accessor(|ctx| Ok(Arc::new(TestPlugin::new(ctx)?) as Arc<dyn Plugin>))
        .with_constructor(TestPlugin::new)
        .with_object_instance(TestPlugin::new);
    assert_eq!(ActivationStrategy::select(&all).map(|s| s.mode()), Some(ActivationMode::Singleton));

    let constructed = ClassDefinition::plugin("com.example.Constructed")
        .with_static_accessor(|ctx| Ok(Arc::new(TestPlugin::new(ctx)?) as Arc<dyn Plugin>))
        .with_constructor(TestPlugin::new);
    assert_eq!(ActivationStrategy::select(&constructed).map(|s| s.mode()), Some(ActivationMode::Constructor));

    let accessed = ClassDefinition::plugin("com.example.Accessed")
        .with_static_accessor(|ctx| Ok(Arc::new(TestPlugin::new(ctx)?) as Arc<dyn Plugin>));
    assert_eq!(ActivationStrategy::select(&accessed).map(|s| s.mode()), Some(ActivationMode::StaticAccessor));

    assert!(ActivationStrategy::select(&ClassDefinition::plugin("com.example.Abstract")).is_none());
    assert!(ActivationStrategy::select(&ClassDefinition::plain("com.example.Util")).is_none());
    // plain classes ignore instantiation hooks
    assert!(!ClassDefinition::plain("com.example.Util").with_constructor(TestPlugin::new).is_plugin());
}

#[test]
fn test_context_hands_metadata_once() {
    let mut slot = LoadingSlot::default();
    {
        let mut context = PluginContext::publish(&mut slot, Arc::new(metadata("economy", Vec::new())), "com.example.Economy");
        assert_eq!(context.class_name(), "com.example.Economy");
        assert_eq!(context.logger().target(), "com.example.Economy");
        assert_eq!(context.take_metadata().unwrap().id(), "economy");
        assert!(matches!(context.take_metadata(), Err(PluginError::InvalidState)));
    }
    assert!(slot.is_empty());
}

#[test]
fn test_dropping_context_clears_unread_metadata() {
    let mut slot = LoadingSlot::default();
    drop(PluginContext::publish(&mut slot, Arc::new(metadata("economy", Vec::new())), "com.example.Economy"));
    assert!(slot.is_empty());
}

#[test]
fn test_singleton_is_created_once() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let definition = ClassDefinition::plugin("com.example.Object").with_object_instance(move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        TestPlugin::new(ctx)
    });
    let strategy = ActivationStrategy::select(&definition).unwrap();
    let ActivationStrategy::Singleton(singleton) = &strategy else {
        panic!("expected a singleton strategy");
    };
    assert!(!singleton.is_initialized());

    let mut slot = LoadingSlot::default();
    let first = {
        let mut context = PluginContext::publish(&mut slot, Arc::new(metadata("object", Vec::new())), "com.example.Object");
        strategy.activate(&mut context).unwrap()
    };
    let second = {
        let mut context = PluginContext::publish(&mut slot, Arc::new(metadata("object", Vec::new())), "com.example.Object");
        ActivationStrategy::select(&definition).unwrap().activate(&mut context).unwrap()
    };

    assert!(Arc::ptr_eq(&first, &second));
    assert!(singleton.is_initialized());
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_plugin_base_outside_of_a_load() {
    struct Eager {
        base: PluginBase,
    }

    let mut slot = LoadingSlot::default();
    let mut context = PluginContext::publish(&mut slot, Arc::new(metadata("eager", Vec::new())), "com.example.Eager");
    let eager = Eager { base: PluginBase::new(&mut context).unwrap() };
    assert_eq!(eager.base.metadata().id(), "eager");
    assert_eq!(eager.base.shared_metadata().name(), "eager plugin");
    assert_eq!(eager.base.logger().target(), "com.example.Eager");

    // a second instance in the same context has nothing left to read
    assert!(matches!(PluginBase::new(&mut context), Err(PluginError::InvalidState)));
}

#[test]
fn test_class_path_registration() {
    let mut class_path = ClassPath::new().with_class(ClassDefinition::plain("com.example.Util"));
    assert!(class_path.contains("com.example.Util"));
    assert!(class_path.register(ClassDefinition::plugin("com.example.Util")).is_some());
    assert!(class_path.get("com.example.Util").is_some_and(ClassDefinition::is_plugin));
    assert_eq!(class_path.len(), 1);
}
