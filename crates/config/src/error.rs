use std::path::PathBuf;

use crate::ValidationErrors;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML.
    #[error(transparent)]
    TomlParse(#[from] toml::de::Error),

    /// The document does not match the root schema. Nothing else is checked
    /// once the root shape is wrong.
    #[error("invalid configuration structure")]
    Schema(#[source] toml::de::Error),

    #[error("'project' must be set to a non-empty string")]
    MissingProject,

    /// Every structural problem found in the document.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A top-level field could not be decoded.
    #[error("invalid '{field}' field")]
    Field {
        field: &'static str,
        #[source]
        source: toml::de::Error,
    },

    /// A stanza of an app could not be decoded.
    #[error("invalid '{stanza}' stanza in app {app:?}")]
    Stanza {
        app: String,
        stanza: &'static str,
        #[source]
        source: toml::de::Error,
    },

    /// Expressions in a stanza could not be evaluated.
    #[error("failed to evaluate '{stanza}' stanza in app {app:?}")]
    Eval {
        app: String,
        stanza: &'static str,
        #[source]
        source: waypoint_expressions::Error,
    },

    #[error("no app named {0:?}")]
    UnknownApp(String),
}
