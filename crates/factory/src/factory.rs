use std::fmt;

use indexmap::IndexMap;

use crate::{
    Builder, ComponentKind, ComponentType, Error, FromPluginContext, Platform, PluginContext,
    PluginOutput, Registry, ReleaseManager, Result,
};

/// A type-erased constructor as stored in a [`Factory`].
pub type BoxedConstructor<T> =
    Box<dyn Fn(&PluginContext) -> anyhow::Result<PluginOutput<T>> + Send + Sync>;

/// A function that can construct a `T` component.
///
/// Implemented for any `Fn` of up to four arguments whose argument types all
/// implement [`FromPluginContext`] and whose return value converts into a
/// [`PluginOutput<T>`]. A constructor asks for the context values it needs
/// through its own signature:
///
/// ```ignore
/// fn new_docker(source: Arc<Source>, span: tracing::Span) -> anyhow::Result<Box<dyn Builder>> {
///     /* ... */
/// }
/// ```
pub trait Constructor<Args, T: ?Sized>: Send + Sync + 'static {
    fn construct(&self, ctx: &PluginContext) -> anyhow::Result<PluginOutput<T>>;
}

macro_rules! impl_constructor {
    ($($arg:ident),*) => {
        impl<F, R, T, $($arg,)*> Constructor<($($arg,)*), T> for F
        where
            F: Fn($($arg),*) -> anyhow::Result<R> + Send + Sync + 'static,
            R: Into<PluginOutput<T>>,
            T: ?Sized,
            $($arg: FromPluginContext,)*
        {
            #[allow(unused_variables)]
            fn construct(&self, ctx: &PluginContext) -> anyhow::Result<PluginOutput<T>> {
                let output = (self)($(<$arg as FromPluginContext>::from_context(ctx)),*)?;
                Ok(output.into())
            }
        }
    };
}

impl_constructor!();
impl_constructor!(A);
impl_constructor!(A, B);
impl_constructor!(A, B, C);
impl_constructor!(A, B, C, D);

/// Maps plugin names to constructors for one component type.
pub struct Factory<T: ?Sized> {
    constructors: IndexMap<String, BoxedConstructor<T>>,
}

impl<T: ?Sized> Default for Factory<T> {
    fn default() -> Self {
        Self {
            constructors: Default::default(),
        }
    }
}

impl<T: ?Sized + ComponentKind> Factory<T> {
    /// Registers a constructor under the given name. Names are unique per
    /// component type.
    pub fn register<Args: 'static, C: Constructor<Args, T>>(
        &mut self,
        name: impl Into<String>,
        constructor: C,
    ) -> Result<()> {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(Error::Duplicate {
                component_type: T::TYPE,
                name,
            });
        }
        self.constructors.insert(
            name,
            Box::new(move |ctx: &PluginContext| constructor.construct(ctx)),
        );
        Ok(())
    }

    /// Returns the constructor registered under the given name.
    pub fn lookup(&self, name: &str) -> Option<&BoxedConstructor<T>> {
        self.constructors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered plugin names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn component_type(&self) -> ComponentType {
        T::TYPE
    }
}

impl<T: ?Sized> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// One [`Factory`] per component type.
///
/// Populate it through `&mut` at startup, then share it (e.g. in an `Arc`);
/// lookups never mutate.
#[derive(Debug, Default)]
pub struct Factories {
    pub(crate) builders: Factory<dyn Builder>,
    pub(crate) registries: Factory<dyn Registry>,
    pub(crate) platforms: Factory<dyn Platform>,
    pub(crate) release_managers: Factory<dyn ReleaseManager>,
}

impl Factories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor with the factory for `T`.
    pub fn register<T, Args, C>(&mut self, name: impl Into<String>, constructor: C) -> Result<()>
    where
        T: ?Sized + ComponentKind,
        Args: 'static,
        C: Constructor<Args, T>,
    {
        T::factory_mut(self).register(name, constructor)
    }

    /// Returns the factory for `T`.
    pub fn get<T: ?Sized + ComponentKind>(&self) -> &Factory<T> {
        T::factory(self)
    }

    pub fn builders(&self) -> &Factory<dyn Builder> {
        &self.builders
    }

    pub fn registries(&self) -> &Factory<dyn Registry> {
        &self.registries
    }

    pub fn platforms(&self) -> &Factory<dyn Platform> {
        &self.platforms
    }

    pub fn release_managers(&self) -> &Factory<dyn ReleaseManager> {
        &self.release_managers
    }

    /// Registered plugin names for a component type.
    pub fn names(&self, component_type: ComponentType) -> Vec<&str> {
        match component_type {
            ComponentType::Builder => self.builders.names().collect(),
            ComponentType::Registry => self.registries.names().collect(),
            ComponentType::Platform => self.platforms.names().collect(),
            ComponentType::ReleaseManager => self.release_managers.names().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Artifact, Configurable};

    struct Noop;

    impl Configurable for Noop {}

    impl Platform for Noop {
        fn deploy(&self, _ctx: &PluginContext, artifact: &Artifact) -> anyhow::Result<Artifact> {
            Ok(artifact.clone())
        }
    }

    fn noop() -> anyhow::Result<Box<dyn Platform>> {
        Ok(Box::new(Noop))
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut factories = Factories::new();
        factories
            .register::<dyn Platform, _, _>("nomad", noop)
            .unwrap();
        let err = factories
            .register::<dyn Platform, _, _>("nomad", noop)
            .unwrap_err();
        assert!(
            matches!(&err, Error::Duplicate { component_type: ComponentType::Platform, name } if name == "nomad"),
            "{err:?}"
        );
        assert_eq!(err.to_string(), r#"platform plugin "nomad" is already registered"#);
    }

    #[test]
    fn names_are_per_type() {
        let mut factories = Factories::new();
        factories
            .register::<dyn Platform, _, _>("nomad", noop)
            .unwrap();
        factories
            .register::<dyn Platform, _, _>("kubernetes", noop)
            .unwrap();
        assert_eq!(factories.names(ComponentType::Platform), ["nomad", "kubernetes"]);
        assert!(factories.names(ComponentType::Builder).is_empty());
        assert!(factories.platforms().contains("nomad"));
        assert!(factories.get::<dyn Platform>().lookup("docker").is_none());
    }
}
