use std::fmt;

use waypoint_config::Labels;

use crate::{Factories, Factory, PluginContext};

/// The kind of component a plugin provides for a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Produces an artifact from an app's source (the `build` stage).
    Builder,
    /// Stores a built artifact (the `build.registry` stage).
    Registry,
    /// Deploys an artifact (the `deploy` stage).
    Platform,
    /// Releases a deployment (the `release` stage).
    ReleaseManager,
}

impl ComponentType {
    pub const ALL: [ComponentType; 4] = [
        Self::Builder,
        Self::Registry,
        Self::Platform,
        Self::ReleaseManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Registry => "registry",
            Self::Platform => "platform",
            Self::ReleaseManager => "release-manager",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the evaluated body of a `use` declaration to a component.
pub trait Configurable {
    /// The default implementation accepts only an empty body.
    fn configure(&mut self, config: toml::Table) -> anyhow::Result<()> {
        if let Some(key) = config.keys().next() {
            anyhow::bail!("unexpected configuration key {key:?}: this plugin takes no configuration");
        }
        Ok(())
    }
}

/// A value handed from one stage to the next: an image, a pushed image, a
/// deployment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub labels: Labels,
    pub metadata: toml::Table,
}

impl Artifact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A `build` stage implementation.
pub trait Builder: Configurable + Send + Sync {
    fn build(&self, ctx: &PluginContext) -> anyhow::Result<Artifact>;
}

/// A `build.registry` stage implementation.
pub trait Registry: Configurable + Send + Sync {
    fn push(&self, ctx: &PluginContext, artifact: &Artifact) -> anyhow::Result<Artifact>;
}

/// A `deploy` stage implementation.
pub trait Platform: Configurable + Send + Sync {
    fn deploy(&self, ctx: &PluginContext, artifact: &Artifact) -> anyhow::Result<Artifact>;
}

/// A `release` stage implementation.
pub trait ReleaseManager: Configurable + Send + Sync {
    fn release(&self, ctx: &PluginContext, deployment: &Artifact) -> anyhow::Result<Artifact>;
}

/// Ties a component trait object to its [`ComponentType`] and to its factory
/// in a [`Factories`] set.
pub trait ComponentKind: Configurable + Send + Sync + 'static {
    const TYPE: ComponentType;

    fn factory(factories: &Factories) -> &Factory<Self>;

    fn factory_mut(factories: &mut Factories) -> &mut Factory<Self>;
}

macro_rules! component_kinds {
    ($($trait:ident => $variant:ident, $field:ident;)*) => {
        $(
            impl ComponentKind for dyn $trait {
                const TYPE: ComponentType = ComponentType::$variant;

                fn factory(factories: &Factories) -> &Factory<Self> {
                    &factories.$field
                }

                fn factory_mut(factories: &mut Factories) -> &mut Factory<Self> {
                    &mut factories.$field
                }
            }
        )*
    };
}

component_kinds! {
    Builder => Builder, builders;
    Registry => Registry, registries;
    Platform => Platform, platforms;
    ReleaseManager => ReleaseManager, release_managers;
}
