use std::{
    any::{type_name, Any, TypeId},
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::{ComponentKind, Error, Factory, Result};

/// Identifies the project app a component is created for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    app: String,
    path: Option<PathBuf>,
}

impl Source {
    pub fn new(app: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            app: app.into(),
            path,
        }
    }

    /// The app name.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// The app path, relative to the configuration file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// The values available to plugin constructors.
#[derive(Clone, Debug)]
pub struct PluginContext {
    cancel: CancellationToken,
    source: Arc<Source>,
    span: Span,
}

impl PluginContext {
    pub fn new(source: Source) -> Self {
        Self::with_cancellation(source, CancellationToken::new())
    }

    pub fn with_cancellation(source: Source, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            source: Arc::new(source),
            span: Span::none(),
        }
    }

    /// Cancelled when the work this plugin is part of should stop.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    /// The span plugin log events should be recorded in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    fn for_plugin<T: ?Sized + ComponentKind>(&self, name: &str) -> Self {
        let span = tracing::info_span!(
            "plugin",
            component_type = %T::TYPE,
            plugin = name,
            app = self.source.app(),
        );
        Self {
            span,
            ..self.clone()
        }
    }
}

/// A value that can be injected into a plugin constructor.
pub trait FromPluginContext: Sized {
    fn from_context(ctx: &PluginContext) -> Self;
}

impl FromPluginContext for PluginContext {
    fn from_context(ctx: &PluginContext) -> Self {
        ctx.clone()
    }
}

impl FromPluginContext for CancellationToken {
    fn from_context(ctx: &PluginContext) -> Self {
        ctx.cancel.clone()
    }
}

impl FromPluginContext for Arc<Source> {
    fn from_context(ctx: &PluginContext) -> Self {
        ctx.source.clone()
    }
}

impl FromPluginContext for Span {
    fn from_context(ctx: &PluginContext) -> Self {
        ctx.span.clone()
    }
}

/// Releases whatever a plugin instance holds. Called at most once.
pub type ReleaseFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// A started plugin: the component value, the mappers it exposes and its
/// release function.
pub struct Instance<T: ?Sized> {
    component: Box<T>,
    mappers: Vec<Mapper>,
    release: ReleaseFn,
}

impl<T: ?Sized> Instance<T> {
    /// Wraps a component with no mappers and a no-op release.
    pub fn new(component: Box<T>) -> Self {
        Self {
            component,
            mappers: vec![],
            release: Box::new(|| anyhow::Ok(())),
        }
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mappers.push(mapper);
        self
    }

    /// Sets the function that releases this instance.
    pub fn on_release(mut self, release: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.release = Box::new(release);
        self
    }

    pub fn component(&self) -> &T {
        &self.component
    }

    pub fn mappers(&self) -> &[Mapper] {
        &self.mappers
    }

    pub fn into_parts(self) -> (Box<T>, Vec<Mapper>, ReleaseFn) {
        (self.component, self.mappers, self.release)
    }
}

impl<T: ?Sized> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("component", &type_name::<T>())
            .field("mappers", &self.mappers)
            .finish_non_exhaustive()
    }
}

/// What a constructor returns: either a bare component or a full
/// [`Instance`].
pub enum PluginOutput<T: ?Sized> {
    Value(Box<T>),
    Instance(Instance<T>),
}

impl<T: ?Sized> From<Box<T>> for PluginOutput<T> {
    fn from(value: Box<T>) -> Self {
        Self::Value(value)
    }
}

impl<T: ?Sized> From<Instance<T>> for PluginOutput<T> {
    fn from(instance: Instance<T>) -> Self {
        Self::Instance(instance)
    }
}

impl<T: ?Sized> From<PluginOutput<T>> for Instance<T> {
    fn from(output: PluginOutput<T>) -> Self {
        match output {
            PluginOutput::Value(value) => Instance::new(value),
            PluginOutput::Instance(instance) => instance,
        }
    }
}

type MapFn = dyn Fn(&dyn Any) -> anyhow::Result<Box<dyn Any + Send>> + Send + Sync;

/// A named conversion a plugin exposes, from one type to another.
pub struct Mapper {
    name: String,
    input: (TypeId, &'static str),
    output: (TypeId, &'static str),
    func: Box<MapFn>,
}

impl Mapper {
    pub fn new<I, O>(
        name: impl Into<String>,
        func: impl Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    ) -> Self
    where
        I: Any,
        O: Any + Send,
    {
        Self {
            name: name.into(),
            input: (TypeId::of::<I>(), type_name::<I>()),
            output: (TypeId::of::<O>(), type_name::<O>()),
            func: Box::new(move |input: &dyn Any| -> anyhow::Result<Box<dyn Any + Send>> {
                let input = input
                    .downcast_ref::<I>()
                    .ok_or_else(|| anyhow::anyhow!("mapper input is not a {}", type_name::<I>()))?;
                Ok(Box::new(func(input)?))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this mapper converts `I` into `O`.
    pub fn maps<I: Any, O: Any>(&self) -> bool {
        self.input.0 == TypeId::of::<I>() && self.output.0 == TypeId::of::<O>()
    }

    /// Runs the mapper. Fails if `I` and `O` are not the types it was created
    /// with.
    pub fn call<I: Any, O: Any>(&self, input: &I) -> anyhow::Result<O> {
        anyhow::ensure!(
            self.maps::<I, O>(),
            "mapper {:?} maps {} to {}, not {} to {}",
            self.name,
            self.input.1,
            self.output.1,
            type_name::<I>(),
            type_name::<O>(),
        );
        let output = (self.func)(input)?;
        output
            .downcast::<O>()
            .map(|output| *output)
            .map_err(|_| anyhow::anyhow!("mapper {:?} returned an unexpected type", self.name))
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("name", &self.name)
            .field("input", &self.input.1)
            .field("output", &self.output.1)
            .finish()
    }
}

/// Starts the named plugin from the given factory.
///
/// The constructor runs inside a span identifying the component type, the
/// plugin and the app. That span is also what constructors receive when they
/// ask for a [`Span`].
pub fn start<T: ?Sized + ComponentKind>(
    factory: &Factory<T>,
    name: &str,
    ctx: &PluginContext,
) -> Result<Instance<T>> {
    let constructor = factory.lookup(name).ok_or_else(|| Error::UnknownPlugin {
        component_type: T::TYPE,
        name: name.to_owned(),
    })?;
    let ctx = ctx.for_plugin::<T>(name);
    let output = ctx
        .span
        .in_scope(|| constructor(&ctx))
        .map_err(|source| Error::Constructor {
            component_type: T::TYPE,
            name: name.to_owned(),
            source,
        })?;
    tracing::info!(component_type = %T::TYPE, name, "initialized component");
    Ok(output.into())
}
