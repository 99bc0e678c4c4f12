//! Creates configured, closeable components for the stages of a project's
//! apps.
//!
//! ```ignore
//! let project = Project::load("waypoint.toml", Arc::new(factories))?;
//! let app = project.app("web")?;
//! let builder = app.builder(&EvalContext::new())?;
//! for hook in builder.hooks_for("before") { /* ... */ }
//! let artifact = builder.value().build(app.plugin_context())?;
//! builder.close()?;
//! ```

mod component;
mod creator;
mod error;
mod project;

pub use waypoint_config as config;
pub use waypoint_factory as factory;

pub use crate::{
    component::{group_hooks, Component, ComponentInfo, Hooks},
    creator::{create, BuildStage, DeployStage, RegistryStage, ReleaseStage, Stage},
    error::{Error, Result},
    project::{App, Project},
};
