use crate::ComponentType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Plugin registration and lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor was registered twice under the same name.
    #[error("{component_type} plugin {name:?} is already registered")]
    Duplicate {
        component_type: ComponentType,
        name: String,
    },

    /// No constructor is registered under the requested name.
    #[error("unknown {component_type} plugin {name:?}")]
    UnknownPlugin {
        component_type: ComponentType,
        name: String,
    },

    /// The constructor itself failed.
    #[error("failed to initialize {component_type} plugin {name:?}")]
    Constructor {
        component_type: ComponentType,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Duplicate { component_type, .. }
            | Self::UnknownPlugin { component_type, .. }
            | Self::Constructor { component_type, .. } => *component_type,
        }
    }

    /// The plugin name involved.
    pub fn name(&self) -> &str {
        match self {
            Self::Duplicate { name, .. }
            | Self::UnknownPlugin { name, .. }
            | Self::Constructor { name, .. } => name,
        }
    }
}
