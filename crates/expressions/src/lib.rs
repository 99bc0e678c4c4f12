//! Expression evaluation for configuration values.
//!
//! Configuration strings may reference variables with `{{ key }}` expressions.
//! An [`EvalContext`] resolves those references, first through its
//! [`Provider`]s and then through the variables set on it directly.
//! A literal `{{` is written `{{{{`.

pub mod provider;
mod template;

use std::{borrow::Cow, collections::HashMap, fmt::Debug, sync::Arc};

pub use provider::{env::EnvProvider, Provider};
use template::Part;
pub use template::Template;

/// The context configuration expressions are evaluated in.
///
/// A context is cheap to clone and is shared read-only between concurrent
/// evaluations.
#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    variables: HashMap<String, String>,
    providers: Vec<Arc<dyn Provider>>,
}

impl EvalContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        Key::validate(&key)?;
        self.variables.insert(key, value.into());
        Ok(())
    }

    /// Builder-style variant of [`EvalContext::set`].
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Adds a variable provider. Providers are consulted in insertion order,
    /// ahead of the context's own variables.
    pub fn add_provider(&mut self, provider: impl Provider + 'static) {
        self.providers.push(Arc::new(provider));
    }

    /// Resolves the value of a single variable.
    pub fn resolve(&self, key: &Key) -> Result<String> {
        for provider in &self.providers {
            if let Some(value) = provider.get(key).map_err(Error::Provider)? {
                return Ok(value);
            }
        }
        self.variables
            .get(key.as_ref())
            .cloned()
            .ok_or_else(|| Error::Undefined(key.as_ref().to_string()))
    }

    /// Resolves the given template.
    pub fn resolve_template(&self, template: &Template) -> Result<String> {
        let mut resolved_parts: Vec<Cow<str>> = Vec::with_capacity(template.parts().len());
        for part in template.parts() {
            resolved_parts.push(match part {
                Part::Lit(lit) => lit.as_ref().into(),
                Part::Expr(expr) => self.resolve(&Key::new(expr)?)?.into(),
            });
        }
        Ok(resolved_parts.concat())
    }

    /// Evaluates every expression in a string and unescapes literal `{{`.
    pub fn eval_str(&self, value: &str) -> Result<String> {
        self.resolve_template(&Template::new(value)?)
    }

    /// Evaluates every string found in a TOML value, recursing into arrays
    /// and tables. Table keys are left as written.
    pub fn eval_value(&self, value: &toml::Value) -> Result<toml::Value> {
        Ok(match value {
            toml::Value::String(s) => toml::Value::String(self.eval_str(s)?),
            toml::Value::Array(items) => toml::Value::Array(
                items
                    .iter()
                    .map(|item| self.eval_value(item))
                    .collect::<Result<_>>()?,
            ),
            toml::Value::Table(table) => toml::Value::Table(self.eval_table(table)?),
            other => other.clone(),
        })
    }

    /// Evaluates every value of a TOML table.
    pub fn eval_table(&self, table: &toml::Table) -> Result<toml::Table> {
        table
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.eval_value(value)?)))
            .collect()
    }
}

/// A variable key: one or more `.`-separated lower snake-case words, e.g.
/// `region` or `app.name`.
#[derive(Debug, PartialEq, Eq)]
pub struct Key<'a>(&'a str);

impl<'a> Key<'a> {
    /// Creates a new Key.
    pub fn new(key: &'a str) -> Result<Self> {
        Self::validate(key)?;
        Ok(Self(key))
    }

    /// Returns the key as written.
    pub fn as_str(&self) -> &str {
        self.0
    }

    /// Iterates over the `.`-separated segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    // Each segment:
    // - must start with a lowercase ASCII letter
    // - underscores are allowed; one at a time between other characters
    // - all other characters must be lowercase ASCII alphanumeric
    fn validate(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidName(format!("{key:?}: must not be empty")));
        }
        key.split('.')
            .try_for_each(Self::validate_segment)
            .map_err(|reason| Error::InvalidName(format!("{key:?}: {reason}")))
    }

    fn validate_segment(segment: &str) -> std::result::Result<(), String> {
        let (Some(first), Some(last)) = (segment.bytes().next(), segment.bytes().last()) else {
            return Err("'.'-separated segments must not be empty".to_string());
        };
        if let Some(invalid) = segment
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        {
            Err(format!("invalid character {invalid:?}. Variable names may contain only lower-case letters, numbers, underscores and dots."))
        } else if !first.is_ascii_lowercase() {
            Err("segments must start with a lowercase ASCII letter".to_string())
        } else if !last.is_ascii_alphanumeric() {
            Err("segments must end with a lowercase ASCII letter or digit".to_string())
        } else if segment.contains("__") {
            Err("segments must not contain multiple consecutive underscores".to_string())
        } else {
            Ok(())
        }
    }
}

impl<'a> TryFrom<&'a str> for Key<'a> {
    type Error = Error;

    fn try_from(value: &'a str) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for Key<'_> {
    fn as_ref(&self) -> &str {
        self.0
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// An expression evaluation error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid variable name.
    #[error("invalid variable name: {0}")]
    InvalidName(String),

    /// Invalid template.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Variable provider error.
    #[error("provider error: {0:?}")]
    Provider(#[source] anyhow::Error),

    /// Undefined variable.
    #[error("undefined variable {0:?}")]
    Undefined(String),
}
