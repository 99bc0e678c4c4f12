//! Serialization types for the configuration document.

use serde::Deserialize;
use waypoint_expressions::EvalContext;

use crate::Labels;

/// `[[plugin]]`
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Plugin {
    /// `name = "docker"`
    pub name: String,
    /// `type = { builder = true }`
    #[serde(default, rename = "type")]
    pub types: PluginTypes,
    /// `checksum = "..."`
    #[serde(default)]
    pub checksum: Option<String>,
}

/// The component types a declared plugin provides.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PluginTypes {
    pub mapper: bool,
    pub builder: bool,
    pub registry: bool,
    pub platform: bool,
    pub releaser: bool,
}

/// `[runner]`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Runner {
    /// `enabled = true`
    #[serde(default)]
    pub enabled: bool,
    /// `[runner.data_source.<type>]`
    #[serde(default)]
    pub data_source: Option<DataSource>,
}

/// Where a remote runner fetches the project from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "toml::Value")]
pub struct DataSource {
    pub kind: String,
    pub body: toml::Table,
}

impl TryFrom<toml::Value> for DataSource {
    type Error = String;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        let (kind, body) = named_body(value, "data_source")?;
        Ok(Self { kind, body })
    }
}

/// `[app.<name>.url]`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppUrl {
    /// `auto_hostname = false`
    #[serde(default)]
    pub auto_hostname: Option<bool>,
}

/// A command run at a named point around a stage.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Hook {
    /// `when = "before"`
    pub when: String,
    /// `command = ["make", "assets"]`
    pub command: Vec<String>,
    /// `on_failure = "continue"`
    #[serde(default)]
    pub on_failure: Option<String>,
}

impl Hook {
    /// Whether a failure of this hook should not abort the stage.
    pub fn continue_on_failure(&self) -> bool {
        self.on_failure.as_deref() == Some("continue")
    }

    pub(crate) fn evaluate(self, ctx: &EvalContext) -> waypoint_expressions::Result<Self> {
        let command = self
            .command
            .iter()
            .map(|token| ctx.eval_str(token))
            .collect::<Result<_, _>>()?;
        Ok(Self { command, ..self })
    }
}

/// The plugin a stage uses and its raw, unevaluated configuration body.
///
/// Written either as `use = "docker"` or as a table with a single key:
/// `[app.web.build.use.docker]`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "toml::Value")]
pub struct Use {
    pub plugin: String,
    pub body: toml::Table,
}

impl TryFrom<toml::Value> for Use {
    type Error = String;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        let (plugin, body) = named_body(value, "use")?;
        Ok(Self { plugin, body })
    }
}

fn named_body(value: toml::Value, what: &str) -> Result<(String, toml::Table), String> {
    match value {
        toml::Value::String(name) if !name.is_empty() => Ok((name, Default::default())),
        toml::Value::Table(table) => {
            let mut entries = table.into_iter();
            match (entries.next(), entries.next()) {
                (Some((name, toml::Value::Table(body))), None) => Ok((name, body)),
                (Some((name, _)), None) => Err(format!("'{what}.{name}' must be a table")),
                (None, _) => Err(format!("'{what}' must name exactly one plugin, found none")),
                (Some(_), Some(_)) => Err(format!(
                    "'{what}' must name exactly one plugin, found {}",
                    2 + entries.count()
                )),
            }
        }
        _ => Err(format!(
            "'{what}' must be a non-empty name or a table with a single entry"
        )),
    }
}

/// `[app.<name>.deploy]`, `[app.<name>.release]` and `[app.<name>.build.registry]`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawOperation {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, rename = "hook")]
    pub hooks: Vec<Hook>,
    #[serde(default, rename = "use")]
    pub use_: Option<Use>,
}

/// `[app.<name>.build]`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawBuild {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, rename = "hook")]
    pub hooks: Vec<Hook>,
    #[serde(default, rename = "use")]
    pub use_: Option<Use>,
    #[serde(default)]
    pub registry: Option<RawOperation>,
}

impl RawBuild {
    /// Splits the build stanza from its nested registry stanza.
    pub fn into_parts(self) -> (RawOperation, Option<RawOperation>) {
        let build = RawOperation {
            labels: self.labels,
            hooks: self.hooks,
            use_: self.use_,
        };
        (build, self.registry)
    }
}

/// Accepts a single table or an array of tables, so that stanza counts can be
/// checked instead of failing to decode.
pub(crate) mod one_or_many {
    use serde::{de::DeserializeOwned, Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        match toml::Value::deserialize(deserializer)? {
            toml::Value::Array(items) => items
                .into_iter()
                .map(|item| T::deserialize(item).map_err(serde::de::Error::custom))
                .collect(),
            value => Ok(vec![T::deserialize(value).map_err(serde::de::Error::custom)?]),
        }
    }
}
