use std::{path::Path, sync::Arc};

use tokio_util::sync::CancellationToken;
use waypoint_config::{Config, EvalContext, Labels};
use waypoint_factory::{
    Builder, Factories, Platform, PluginContext, Registry, ReleaseManager, Source,
};

use crate::{
    creator::{create, BuildStage, DeployStage, RegistryStage, ReleaseStage, Stage},
    Component, Result,
};

/// A validated configuration together with the plugins available to it.
#[derive(Debug)]
pub struct Project {
    config: Config,
    factories: Arc<Factories>,
    cancel: CancellationToken,
}

impl Project {
    /// Validates the configuration. Invalid configurations are refused before
    /// any stage is evaluated.
    pub fn new(config: Config, factories: Arc<Factories>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factories,
            cancel: CancellationToken::new(),
        })
    }

    /// Loads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>, factories: Arc<Factories>) -> Result<Self> {
        Self::new(Config::load_file(path)?, factories)
    }

    pub fn name(&self) -> &str {
        self.config.project().unwrap_or_default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Document-level labels.
    pub fn labels(&self) -> Result<Labels> {
        Ok(self.config.labels()?)
    }

    pub fn factories(&self) -> &Arc<Factories> {
        &self.factories
    }

    /// Returns the named app.
    pub fn app(&self, name: &str) -> Result<App> {
        let config = self.config.app(name)?;
        let source = Source::new(config.name(), config.path().map(Path::to_owned));
        Ok(App {
            plugin_ctx: PluginContext::with_cancellation(source, self.cancel.child_token()),
            factories: self.factories.clone(),
            config,
        })
    }

    /// Returns every app, in document order.
    pub fn apps(&self) -> Result<Vec<App>> {
        self.config
            .app_names()
            .map(|name| self.app(name))
            .collect()
    }

    /// Cancels the plugin context of every app of this project.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// One app of a [`Project`], able to create the components for its stages.
#[derive(Debug)]
pub struct App {
    config: waypoint_config::App,
    factories: Arc<Factories>,
    plugin_ctx: PluginContext,
}

impl App {
    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn labels(&self) -> &Labels {
        self.config.labels()
    }

    pub fn config(&self) -> &waypoint_config::App {
        &self.config
    }

    pub fn factories(&self) -> &Factories {
        &self.factories
    }

    /// The context plugin constructors draw their injected values from.
    pub fn plugin_context(&self) -> &PluginContext {
        &self.plugin_ctx
    }

    /// An app whose configuration skipped validation.
    #[cfg(test)]
    pub(crate) fn unvalidated(config: waypoint_config::App, factories: Arc<Factories>) -> Self {
        let source = Source::new(config.name(), config.path().map(Path::to_owned));
        Self {
            plugin_ctx: PluginContext::new(source),
            factories,
            config,
        }
    }

    /// Creates the component for stage `S`.
    pub fn component<S: Stage>(&self, ctx: &EvalContext) -> Result<Component<S::Value>> {
        create::<S>(self, ctx)
    }

    pub fn builder(&self, ctx: &EvalContext) -> Result<Component<dyn Builder>> {
        self.component::<BuildStage>(ctx)
    }

    pub fn registry(&self, ctx: &EvalContext) -> Result<Component<dyn Registry>> {
        self.component::<RegistryStage>(ctx)
    }

    pub fn platform(&self, ctx: &EvalContext) -> Result<Component<dyn Platform>> {
        self.component::<DeployStage>(ctx)
    }

    pub fn release_manager(&self, ctx: &EvalContext) -> Result<Component<dyn ReleaseManager>> {
        self.component::<ReleaseStage>(ctx)
    }
}
