use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use waypoint_factory::{
    start, Artifact, Builder, CancellationToken, ComponentType, Configurable, Error, Factories,
    Instance, Mapper, PluginContext, Source,
};

#[derive(Default)]
struct TestBuilder {
    app: String,
}

impl Configurable for TestBuilder {}

impl Builder for TestBuilder {
    fn build(&self, _ctx: &PluginContext) -> anyhow::Result<Artifact> {
        Ok(Artifact::new(format!("{}:latest", self.app)))
    }
}

fn ctx() -> PluginContext {
    PluginContext::new(Source::new("web", None))
}

fn bare() -> anyhow::Result<Box<dyn Builder>> {
    Ok(Box::<TestBuilder>::default())
}

#[test]
fn bare_values_get_a_noop_release() {
    let mut factories = Factories::new();
    factories
        .register::<dyn Builder, _, _>("bare", bare)
        .unwrap();

    let instance = start(factories.builders(), "bare", &ctx()).unwrap();
    let (_, mappers, release) = instance.into_parts();
    assert!(mappers.is_empty());
    release().unwrap();
}

#[test]
fn instances_are_used_as_is() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();

    let mut factories = Factories::new();
    factories
        .register::<dyn Builder, _, _>(
            "full",
            move || -> anyhow::Result<Instance<dyn Builder>> {
                let counter = counter.clone();
                let component: Box<dyn Builder> = Box::<TestBuilder>::default();
                Ok(Instance::new(component)
                    .with_mapper(Mapper::new("id", |artifact: &Artifact| Ok(artifact.id.clone())))
                    .on_release(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }))
            },
        )
        .unwrap();

    let instance = start(factories.builders(), "full", &ctx()).unwrap();
    assert_eq!(instance.mappers()[0].name(), "id");
    let (_, _, release) = instance.into_parts();
    assert_eq!(released.load(Ordering::SeqCst), 0);
    release().unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn constructors_receive_injected_values() {
    let mut factories = Factories::new();
    factories
        .register::<dyn Builder, _, _>(
            "injected",
            |source: Arc<Source>, cancel: CancellationToken, _span: tracing::Span| -> anyhow::Result<Box<dyn Builder>> {
                anyhow::ensure!(!cancel.is_cancelled(), "cancelled");
                Ok(Box::new(TestBuilder {
                    app: source.app().to_owned(),
                }))
            },
        )
        .unwrap();

    let ctx = ctx();
    let instance = start(factories.builders(), "injected", &ctx).unwrap();
    let artifact = instance.component().build(&ctx).unwrap();
    assert_eq!(artifact.id, "web:latest");

    ctx.cancellation().cancel();
    let err = start(factories.builders(), "injected", &ctx).unwrap_err();
    assert!(matches!(err, Error::Constructor { .. }), "{err:?}");
}

#[test]
fn unknown_plugin_is_named() {
    let factories = Factories::new();
    let err = start(factories.builders(), "docker", &ctx()).unwrap_err();
    assert!(
        matches!(&err, Error::UnknownPlugin { component_type: ComponentType::Builder, name } if name == "docker"),
        "{err:?}"
    );
    assert_eq!(err.to_string(), r#"unknown builder plugin "docker""#);
}

#[test]
fn constructor_errors_name_type_and_plugin() {
    let mut factories = Factories::new();
    factories
        .register::<dyn Builder, _, _>("broken", || -> anyhow::Result<Box<dyn Builder>> {
            anyhow::bail!("docker daemon not reachable")
        })
        .unwrap();

    let err = start(factories.builders(), "broken", &ctx()).unwrap_err();
    assert_eq!(err.component_type(), ComponentType::Builder);
    assert_eq!(err.name(), "broken");
    let chain = anyhow::Error::from(err)
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    assert_eq!(
        chain,
        [
            r#"failed to initialize builder plugin "broken""#,
            "docker daemon not reachable"
        ]
    );
}
