//! Component types, the factory registry and the plugin lifecycle.
//!
//! A [`Factories`] set maps plugin names to constructors, one [`Factory`] per
//! [`ComponentType`]. It is populated once at startup and then shared
//! read-only. [`start`] resolves a constructor by name, injects the values it
//! asks for from a [`PluginContext`], and normalizes the result into an
//! [`Instance`] that can be released.

mod component;
mod error;
mod factory;
mod plugin;

pub use crate::{
    component::{
        Artifact, Builder, ComponentKind, ComponentType, Configurable, Platform, Registry,
        ReleaseManager,
    },
    error::{Error, Result},
    factory::{BoxedConstructor, Constructor, Factories, Factory},
    plugin::{
        start, FromPluginContext, Instance, Mapper, PluginContext, PluginOutput, ReleaseFn, Source,
    },
};

pub use tokio_util::sync::CancellationToken;
