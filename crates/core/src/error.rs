use waypoint_factory::ComponentType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Component creation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration could not be loaded, validated or evaluated.
    #[error(transparent)]
    Config(#[from] waypoint_config::Error),

    /// The app has no stanza at all for this component type.
    #[error("no {0} is configured")]
    Unimplemented(ComponentType),

    /// The stanza exists but does not say which plugin to use. Validation
    /// rejects such stanzas, so only unvalidated configurations get here.
    #[error("{component_type} stanza of app {app:?} has no 'use' declaration")]
    MissingUse {
        component_type: ComponentType,
        app: String,
    },

    /// The plugin could not be resolved or constructed.
    #[error(transparent)]
    Plugin(#[from] waypoint_factory::Error),

    /// The plugin rejected its configuration. The plugin has already been
    /// released.
    #[error("failed to configure {component_type} plugin {name:?}")]
    Configure {
        component_type: ComponentType,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Whether the stage is simply not configured, as opposed to misconfigured.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented(_))
    }
}
