use serde::de::DeserializeOwned;
use waypoint_expressions::EvalContext;

use crate::{
    schema::{RawBuild, RawOperation},
    App, Error, Hook, Labels, Result, Use,
};

/// The part of a stage's configuration every stage shares: labels, hooks and
/// the plugin to use.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Operation {
    pub labels: Labels,
    pub hooks: Vec<Hook>,
    pub use_: Option<Use>,
}

/// Implemented by every stage configuration type.
pub trait AsOperation: Send + Sync + 'static {
    fn operation(&self) -> &Operation;

    fn into_operation(self) -> Operation;
}

macro_rules! operation_stanzas {
    ($($(#[$attr:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$attr])*
            #[derive(Clone, Debug, Default, PartialEq)]
            pub struct $name {
                operation: Operation,
            }

            impl $name {
                pub fn new(operation: Operation) -> Self {
                    Self { operation }
                }
            }

            impl AsOperation for $name {
                fn operation(&self) -> &Operation {
                    &self.operation
                }

                fn into_operation(self) -> Operation {
                    self.operation
                }
            }
        )*
    };
}

operation_stanzas! {
    /// Evaluated `[app.<name>.build]` settings.
    Build,
    /// Evaluated `[app.<name>.build.registry]` settings.
    Registry,
    /// Evaluated `[app.<name>.deploy]` settings.
    Deploy,
    /// Evaluated `[app.<name>.release]` settings.
    Release,
}

impl App {
    /// Evaluates the build stage, or returns `None` if the app has no
    /// `build` stanza.
    pub fn build(&self, ctx: &EvalContext) -> Result<Option<Build>> {
        let Some(raw) = self.stanza::<RawBuild>("build")? else {
            return Ok(None);
        };
        let (build, _) = raw.into_parts();
        self.evaluate("build", build, ctx).map(|op| Some(Build::new(op)))
    }

    /// Evaluates the registry stage nested in the build stanza.
    pub fn registry(&self, ctx: &EvalContext) -> Result<Option<Registry>> {
        let Some(raw) = self.stanza::<RawBuild>("build")? else {
            return Ok(None);
        };
        let (_, registry) = raw.into_parts();
        registry
            .map(|registry| self.evaluate("registry", registry, ctx).map(Registry::new))
            .transpose()
    }

    pub fn deploy(&self, ctx: &EvalContext) -> Result<Option<Deploy>> {
        self.stanza::<RawOperation>("deploy")?
            .map(|deploy| self.evaluate("deploy", deploy, ctx).map(Deploy::new))
            .transpose()
    }

    pub fn release(&self, ctx: &EvalContext) -> Result<Option<Release>> {
        self.stanza::<RawOperation>("release")?
            .map(|release| self.evaluate("release", release, ctx).map(Release::new))
            .transpose()
    }

    fn stanza<T: DeserializeOwned>(&self, stanza: &'static str) -> Result<Option<T>> {
        self.body
            .get(stanza)
            .map(|value| {
                T::deserialize(value.clone()).map_err(|source| Error::Stanza {
                    app: self.name.clone(),
                    stanza,
                    source,
                })
            })
            .transpose()
    }

    // Label values and hook commands are evaluated here; `use` bodies are
    // left raw for the plugin to receive.
    fn evaluate(
        &self,
        stanza: &'static str,
        raw: RawOperation,
        ctx: &EvalContext,
    ) -> Result<Operation> {
        let eval_err = |source| Error::Eval {
            app: self.name.clone(),
            stanza,
            source,
        };
        let labels = raw
            .labels
            .into_iter()
            .map(|(key, value)| ctx.eval_str(&value).map(|value| (key, value)))
            .collect::<waypoint_expressions::Result<Labels>>()
            .map_err(eval_err)?;
        let hooks = raw
            .hooks
            .into_iter()
            .map(|hook| hook.evaluate(ctx))
            .collect::<waypoint_expressions::Result<Vec<_>>>()
            .map_err(eval_err)?;
        Ok(Operation {
            labels,
            hooks,
            use_: raw.use_,
        })
    }
}
