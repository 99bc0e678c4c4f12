use std::fmt::Debug;

use crate::Key;

/// Environment variable based provider.
pub mod env;

/// A source of variable values consulted by an [`crate::EvalContext`].
pub trait Provider: Debug + Send + Sync {
    /// Returns the value for the given key, if this provider has one.
    fn get(&self, key: &Key) -> anyhow::Result<Option<String>>;
}
