use anyhow::Context;

use crate::{Key, Provider};

const DEFAULT_PREFIX: &str = "WAYPOINT_VAR";

/// A Provider that reads variables from the process environment.
///
/// The key `app.image_tag` with the default prefix is read from
/// `WAYPOINT_VAR_APP_IMAGE_TAG`.
#[derive(Debug)]
pub struct EnvProvider {
    prefix: String,
}

impl EnvProvider {
    /// Creates a new EnvProvider.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn env_key(&self, key: &Key) -> String {
        let name = key
            .segments()
            .map(str::to_ascii_uppercase)
            .collect::<Vec<_>>()
            .join("_");
        format!("{}_{name}", self.prefix)
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl Provider for EnvProvider {
    fn get(&self, key: &Key) -> anyhow::Result<Option<String>> {
        let env_key = self.env_key(key);
        match std::env::var(&env_key) {
            Err(std::env::VarError::NotPresent) => Ok(None),
            other => other
                .map(Some)
                .with_context(|| format!("failed to resolve env var {env_key}")),
        }
    }
}
