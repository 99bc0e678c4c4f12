//! Waypoint configuration documents.
//!
//! A [`Config`] is loaded from TOML text without interpreting it. Call
//! [`Config::validate`] to check the whole document structure in one pass, then
//! evaluate individual stages lazily through [`App`].

mod error;
mod schema;
mod stages;
mod validate;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use waypoint_expressions as expressions;
pub use waypoint_expressions::EvalContext;

pub use crate::{
    error::{Error, Result},
    schema::{AppUrl, DataSource, Hook, Plugin, PluginTypes, Runner, Use},
    stages::{AsOperation, Build, Deploy, Operation, Registry, Release},
    validate::{validate_labels, LabelError, LabelScope, Location, ValidationError, ValidationErrors},
};

/// String labels attached to documents, apps and operations.
pub type Labels = indexmap::IndexMap<String, String>;

/// The default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "waypoint.toml";

/// A loaded configuration document.
#[derive(Clone, Debug)]
pub struct Config {
    source: String,
    path: Option<PathBuf>,
    table: toml::Table,
}

impl Config {
    /// Loads a document from TOML text. Only the TOML syntax is checked here.
    pub fn load(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let table = source.parse::<toml::Table>()?;
        Ok(Self {
            source,
            path: None,
            table,
        })
    }

    /// Loads a document from a file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut config = Self::load(source)?;
        config.path = Some(path.to_owned());
        Ok(config)
    }

    /// Validates the structure of the whole document.
    ///
    /// Required fields, stanza cardinality and labels are checked. Plugin
    /// bodies and expressions are not; those are checked when each stage is
    /// evaluated and configured.
    pub fn validate(&self) -> Result<()> {
        validate::validate(self)
    }

    /// The raw document text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The file this document was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn project(&self) -> Option<&str> {
        self.table.get("project").and_then(toml::Value::as_str)
    }

    /// Document-level labels.
    pub fn labels(&self) -> Result<Labels> {
        Ok(self.root_field("labels")?.unwrap_or_default())
    }

    /// Declared plugins.
    pub fn plugins(&self) -> Result<Vec<Plugin>> {
        Ok(self.root_field("plugin")?.unwrap_or_default())
    }

    pub fn runner(&self) -> Result<Runner> {
        Ok(self.root_field("runner")?.unwrap_or_default())
    }

    /// Names of all apps, in document order.
    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.table
            .get("app")
            .and_then(toml::Value::as_table)
            .into_iter()
            .flat_map(|apps| apps.keys().map(String::as_str))
    }

    /// Returns the named app.
    pub fn app(&self, name: &str) -> Result<App> {
        let table = self
            .table
            .get("app")
            .and_then(|apps| apps.get(name))
            .and_then(toml::Value::as_table)
            .ok_or_else(|| Error::UnknownApp(name.to_owned()))?;
        App::new(name, table.clone())
    }

    /// Returns every app, in document order.
    pub fn apps(&self) -> Result<Vec<App>> {
        self.app_names().map(|name| self.app(name)).collect()
    }

    fn root_field<T: DeserializeOwned>(&self, field: &'static str) -> Result<Option<T>> {
        self.table
            .get(field)
            .map(|value| T::deserialize(value.clone()).map_err(|source| Error::Field { field, source }))
            .transpose()
    }
}

/// The header fields of an app; stanzas are decoded on demand.
#[derive(Deserialize)]
struct AppHeader {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    url: AppUrl,
}

/// A single app of a configuration document.
///
/// Stage stanzas are kept raw and only decoded and evaluated when requested
/// through [`App::build`], [`App::registry`], [`App::deploy`] and
/// [`App::release`].
#[derive(Clone, Debug)]
pub struct App {
    name: String,
    path: Option<PathBuf>,
    labels: Labels,
    url: AppUrl,
    body: toml::Table,
}

impl App {
    fn new(name: &str, body: toml::Table) -> Result<Self> {
        let header = AppHeader::deserialize(toml::Value::Table(body.clone())).map_err(|source| {
            Error::Stanza {
                app: name.to_owned(),
                stanza: "app",
                source,
            }
        })?;
        Ok(Self {
            name: name.to_owned(),
            path: header.path,
            labels: header.labels,
            url: header.url,
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The app's path, relative to the configuration file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn url(&self) -> &AppUrl {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        project = "demo"

        [labels]
        team = "platform"

        [[plugin]]
        name = "docker"
        type = { builder = true, registry = true }

        [app.web]
        path = "./web"
        url = { auto_hostname = false }

        [app.web.build]
        use = "docker"

        [app.web.deploy]
        use = "kubernetes"

        [app.api.build]
        use = "pack"

        [app.api.deploy]
        use = "nomad"
    "#;

    #[test]
    fn load_reads_root_fields() {
        let config = Config::load(DOC).unwrap();
        assert_eq!(config.project(), Some("demo"));
        assert_eq!(config.labels().unwrap()["team"], "platform");
        let plugins = config.plugins().unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "docker");
        assert!(plugins[0].types.builder && plugins[0].types.registry);
        assert!(!plugins[0].types.platform);
        assert!(!config.runner().unwrap().enabled);
    }

    #[test]
    fn apps_keep_document_order() {
        let config = Config::load(DOC).unwrap();
        assert_eq!(config.app_names().collect::<Vec<_>>(), ["web", "api"]);

        let web = config.app("web").unwrap();
        assert_eq!(web.path(), Some(Path::new("./web")));
        assert_eq!(web.url().auto_hostname, Some(false));
        assert!(web.labels().is_empty());
    }

    #[test]
    fn unknown_app() {
        let config = Config::load(DOC).unwrap();
        assert!(matches!(config.app("nope"), Err(Error::UnknownApp(name)) if name == "nope"));
    }

    #[test]
    fn load_rejects_bad_syntax() {
        assert!(matches!(
            Config::load("project = "),
            Err(Error::TomlParse(_))
        ));
    }

    #[test]
    fn load_file_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, DOC).unwrap();
        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.path(), Some(path.as_path()));
        config.validate().unwrap();
    }
}
