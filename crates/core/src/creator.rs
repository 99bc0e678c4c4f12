use waypoint_config::{AsOperation, EvalContext, Operation};
use waypoint_factory::{
    start, Builder, ComponentKind, ComponentType, Configurable, Platform, Registry, ReleaseManager,
};

use crate::{
    component::{group_hooks, Component, ComponentInfo},
    App, Error, Result,
};

/// A stage of an app's lifecycle, tying a stanza to the component type that
/// implements it.
pub trait Stage {
    /// The evaluated stanza.
    type Config: AsOperation;

    /// The component trait object this stage produces.
    type Value: ?Sized + ComponentKind + Configurable;

    /// Evaluates this stage's stanza for the given app, or returns `None` if
    /// the app has no such stanza.
    fn config(
        app: &waypoint_config::App,
        ctx: &EvalContext,
    ) -> waypoint_config::Result<Option<Self::Config>>;
}

macro_rules! stages {
    ($($(#[$attr:meta])* $stage:ident: $config:ident => dyn $value:ident, $method:ident;)*) => {
        $(
            $(#[$attr])*
            #[derive(Debug)]
            pub enum $stage {}

            impl Stage for $stage {
                type Config = waypoint_config::$config;
                type Value = dyn $value;

                fn config(
                    app: &waypoint_config::App,
                    ctx: &EvalContext,
                ) -> waypoint_config::Result<Option<Self::Config>> {
                    app.$method(ctx)
                }
            }
        )*
    };
}

stages! {
    /// `[app.<name>.build]`, implemented by a [`Builder`].
    BuildStage: Build => dyn Builder, build;
    /// `[app.<name>.build.registry]`, implemented by a [`Registry`].
    RegistryStage: Registry => dyn Registry, registry;
    /// `[app.<name>.deploy]`, implemented by a [`Platform`].
    DeployStage: Deploy => dyn Platform, deploy;
    /// `[app.<name>.release]`, implemented by a [`ReleaseManager`].
    ReleaseStage: Release => dyn ReleaseManager, release;
}

/// Creates the component for stage `S` of an app.
///
/// Evaluates the stanza, starts the plugin its `use` declaration names and
/// configures it with the evaluated `use` body. If configuring fails the
/// plugin is released before the error is returned.
pub fn create<S: Stage>(app: &App, ctx: &EvalContext) -> Result<Component<S::Value>> {
    let component_type: ComponentType = <S::Value as ComponentKind>::TYPE;
    let app_name = app.name();

    let Some(config) = S::config(app.config(), ctx)? else {
        tracing::debug!(%component_type, app = app_name, "stage not configured");
        return Err(Error::Unimplemented(component_type));
    };
    tracing::debug!(%component_type, app = app_name, "resolved stage configuration");

    let Operation {
        labels,
        hooks,
        use_,
    } = config.into_operation();
    let use_ = use_.ok_or_else(|| Error::MissingUse {
        component_type,
        app: app_name.to_owned(),
    })?;

    let factory = <S::Value as ComponentKind>::factory(app.factories());
    let instance = start(factory, &use_.plugin, app.plugin_context())?;
    tracing::debug!(%component_type, app = app_name, plugin = %use_.plugin, "started plugin");

    let (mut value, mappers, release) = instance.into_parts();
    let configured = ctx
        .eval_table(&use_.body)
        .map_err(anyhow::Error::from)
        .and_then(|body| value.configure(body));
    if let Err(source) = configured {
        tracing::warn!(%component_type, app = app_name, plugin = %use_.plugin, "configuration failed, releasing plugin");
        if let Err(err) = release() {
            tracing::warn!(%component_type, plugin = %use_.plugin, "failed to release plugin: {err:?}");
        }
        return Err(Error::Configure {
            component_type,
            name: use_.plugin,
            source,
        });
    }
    tracing::debug!(%component_type, app = app_name, plugin = %use_.plugin, "configured plugin");

    Ok(Component::new(
        value,
        ComponentInfo {
            component_type,
            name: use_.plugin,
        },
        group_hooks(hooks),
        labels,
        mappers,
        release,
    ))
}
