use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::{
    schema::{one_or_many, AppUrl, Hook, Plugin, RawBuild, RawOperation, Runner},
    Config, Error, Labels, Result,
};

const RESERVED_LABEL_PREFIX: &str = "waypoint/";
const MAX_LABEL_LEN: usize = 255;

static HOSTNAME_RFC952: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z]([a-zA-Z0-9\-]+[\.]?)*[a-zA-Z0-9]$").expect("hostname regex is valid")
});

/// The full structure of the document, decoded eagerly for validation only.
/// Nothing here is evaluated.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidateRoot {
    project: String,
    #[serde(default)]
    #[allow(dead_code)]
    runner: Option<Runner>,
    #[serde(default)]
    labels: Labels,
    #[serde(default, rename = "plugin")]
    #[allow(dead_code)]
    plugins: Vec<Plugin>,
    #[serde(default, rename = "app")]
    apps: IndexMap<String, toml::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidateApp {
    #[serde(default)]
    #[allow(dead_code)]
    path: Option<PathBuf>,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    #[allow(dead_code)]
    url: AppUrl,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    build: Vec<RawBuild>,
    #[serde(default, deserialize_with = "one_or_many::deserialize")]
    deploy: Vec<RawOperation>,
    #[serde(default)]
    release: Option<RawOperation>,
}

pub(crate) fn validate(config: &Config) -> Result<()> {
    let root: ValidateRoot = toml::from_str(config.source()).map_err(Error::Schema)?;
    if root.project.trim().is_empty() {
        return Err(Error::MissingProject);
    }

    let mut errors = vec![];
    if root.apps.is_empty() {
        errors.push(ValidationError::NoApps);
    }
    let headers = app_header_offsets(config.source());
    for (name, app) in root.apps {
        let location = headers
            .get(&name)
            .map(|&offset| Location::from_offset(config.source(), offset, config.path()));
        validate_app(&name, location, app, &mut errors);
    }

    push_label_errors(LabelScope::Document, &root.labels, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors).into())
    }
}

/// Finds the byte offset of the first line that defines part of each app,
/// whether through a table header, a dotted key or an inline table.
fn app_header_offsets(source: &str) -> IndexMap<String, usize> {
    let mut offsets = IndexMap::new();
    let mut table = String::new();
    let mut in_multiline = false;
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let odd_quotes = (line.matches("\"\"\"").count() + line.matches("'''").count()) % 2 == 1;
        if in_multiline {
            in_multiline = !odd_quotes;
            continue;
        }
        in_multiline = odd_quotes;

        let code = split_unquoted(line, '#').map_or(line, |(code, _)| code).trim();
        let (path, value) = if code.starts_with('[') {
            table = code.trim_matches(|c| c == '[' || c == ']').trim().to_owned();
            (table.clone(), "0")
        } else if let Some((key, value)) = split_unquoted(code, '=') {
            let key = key.trim();
            if table.is_empty() {
                (key.to_owned(), value)
            } else {
                (format!("{table}.{key}"), value)
            }
        } else {
            continue;
        };
        // A value continued on later lines only parses as a placeholder.
        let Ok(defined) = format!("{path} = {value}")
            .parse::<toml::Table>()
            .or_else(|_| format!("{path} = 0").parse::<toml::Table>())
        else {
            continue;
        };
        if let Some(apps) = defined.get("app").and_then(toml::Value::as_table) {
            let indent = line.len() - line.trim_start().len();
            for name in apps.keys() {
                offsets.entry(name.clone()).or_insert(start + indent);
            }
        }
    }
    offsets
}

/// Splits a line at the first `delim` that is not inside a quoted string.
fn split_unquoted(line: &str, delim: char) -> Option<(&str, &str)> {
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == delim => return Some((&line[..i], &line[i + delim.len_utf8()..])),
            None => {}
        }
    }
    None
}

fn validate_app(
    name: &str,
    location: Option<Location>,
    value: toml::Value,
    errors: &mut Vec<ValidationError>,
) {
    let app = match ValidateApp::deserialize(value) {
        Ok(app) => app,
        Err(error) => {
            errors.push(ValidationError::AppSchema {
                app: name.to_owned(),
                location,
                error,
            });
            return;
        }
    };

    for (stanza, found) in [("build", app.build.len()), ("deploy", app.deploy.len())] {
        if found != 1 {
            errors.push(ValidationError::StanzaCount {
                app: name.to_owned(),
                location: location.clone(),
                stanza,
                found,
            });
        }
    }

    push_label_errors(LabelScope::App(name.to_owned()), &app.labels, errors);

    let mut operations = vec![];
    for build in app.build {
        let (build, registry) = build.into_parts();
        operations.push(("build", build));
        operations.extend(registry.map(|registry| ("registry", registry)));
    }
    operations.extend(app.deploy.into_iter().map(|deploy| ("deploy", deploy)));
    operations.extend(app.release.map(|release| ("release", release)));

    for (stanza, operation) in operations {
        validate_operation(name, &location, stanza, &operation, errors);
    }
}

fn validate_operation(
    app: &str,
    location: &Option<Location>,
    stanza: &'static str,
    operation: &RawOperation,
    errors: &mut Vec<ValidationError>,
) {
    if operation.use_.is_none() {
        errors.push(ValidationError::MissingUse {
            app: app.to_owned(),
            location: location.clone(),
            stanza,
        });
    }

    for (index, hook) in operation.hooks.iter().enumerate() {
        if let Some(reason) = hook_problem(hook) {
            errors.push(ValidationError::Hook {
                app: app.to_owned(),
                location: location.clone(),
                stanza,
                index,
                reason,
            });
        }
    }

    let scope = LabelScope::Stanza {
        app: app.to_owned(),
        stanza,
    };
    push_label_errors(scope, &operation.labels, errors);
}

fn hook_problem(hook: &Hook) -> Option<&'static str> {
    if hook.when.trim().is_empty() {
        Some("'when' must not be empty")
    } else if hook.command.is_empty() {
        Some("'command' must not be empty")
    } else {
        None
    }
}

fn push_label_errors(scope: LabelScope, labels: &Labels, errors: &mut Vec<ValidationError>) {
    errors.extend(
        validate_labels(labels)
            .into_iter()
            .map(|error| ValidationError::Label {
                scope: scope.clone(),
                error,
            }),
    );
}

/// Validates a set of labels, returning every violation of every label:
///
///   * key and value can't be longer than 255 characters each
///   * the key before any '/' must be in hostname format (RFC 952)
///   * keys can't be prefixed with "waypoint/", which is reserved for system use
pub fn validate_labels(labels: &Labels) -> Vec<LabelError> {
    let mut errs = vec![];
    for (key, value) in labels {
        if key.starts_with(RESERVED_LABEL_PREFIX) {
            errs.push(LabelError::ReservedPrefix { key: key.clone() });
        }

        if key.chars().count() > MAX_LABEL_LEN {
            errs.push(LabelError::KeyTooLong { key: key.clone() });
        }

        let host = key.split_once('/').map_or(key.as_str(), |(host, _)| host);
        if !HOSTNAME_RFC952.is_match(host) {
            errs.push(LabelError::InvalidHostname { key: key.clone() });
        }

        if value.chars().count() > MAX_LABEL_LEN {
            errs.push(LabelError::ValueTooLong { key: key.clone() });
        }
    }
    errs
}

/// A single label constraint violation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("label[{key}]: prefix 'waypoint/' is reserved for system use")]
    ReservedPrefix { key: String },
    #[error("label[{key}]: key must be less than or equal to 255 characters")]
    KeyTooLong { key: String },
    #[error("label[{key}]: key before '/' must be a valid hostname (RFC 952)")]
    InvalidHostname { key: String },
    #[error("label[{key}]: value must be less than or equal to 255 characters")]
    ValueTooLong { key: String },
}

impl LabelError {
    /// The offending label key.
    pub fn key(&self) -> &str {
        match self {
            Self::ReservedPrefix { key }
            | Self::KeyTooLong { key }
            | Self::InvalidHostname { key }
            | Self::ValueTooLong { key } => key,
        }
    }
}

/// Where in the document a set of labels was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelScope {
    Document,
    App(String),
    Stanza { app: String, stanza: &'static str },
}

impl Display for LabelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("labels"),
            Self::App(app) => write!(f, "app {app:?} labels"),
            Self::Stanza { app, stanza } => write!(f, "app {app:?} '{stanza}' labels"),
        }
    }
}

/// A position in the configuration source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub(crate) fn from_offset(source: &str, offset: usize, path: Option<&Path>) -> Self {
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |line| line.chars().count())
            + 1;
        Self {
            path: path.map(ToOwned::to_owned),
            line,
            column,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}:", path.display())?;
        }
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Prefixes a message with a location, when one is known.
struct At<'a>(&'a Option<Location>);

impl Display for At<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(location) => write!(f, "{location}: "),
            None => Ok(()),
        }
    }
}

/// A structural problem with a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("at least one app must be defined")]
    NoApps,

    #[error("{}invalid app {app:?}: {error}", At(.location))]
    AppSchema {
        app: String,
        location: Option<Location>,
        error: toml::de::Error,
    },

    #[error("{}app {app:?} requires exactly one '{stanza}' stanza, found {found}", At(.location))]
    StanzaCount {
        app: String,
        location: Option<Location>,
        stanza: &'static str,
        found: usize,
    },

    #[error("{}'{stanza}' stanza of app {app:?} has no 'use' stanza", At(.location))]
    MissingUse {
        app: String,
        location: Option<Location>,
        stanza: &'static str,
    },

    #[error("{}hook #{index} of '{stanza}' stanza in app {app:?}: {reason}", At(.location))]
    Hook {
        app: String,
        location: Option<Location>,
        stanza: &'static str,
        index: usize,
        reason: &'static str,
    },

    #[error("{scope}: {error}")]
    Label { scope: LabelScope, error: LabelError },
}

impl ValidationError {
    /// The app this error is about, if any.
    pub fn app(&self) -> Option<&str> {
        match self {
            Self::AppSchema { app, .. }
            | Self::StanzaCount { app, .. }
            | Self::MissingUse { app, .. }
            | Self::Hook { app, .. } => Some(app.as_str()),
            Self::Label {
                scope: LabelScope::App(app) | LabelScope::Stanza { app, .. },
                ..
            } => Some(app.as_str()),
            Self::NoApps
            | Self::Label {
                scope: LabelScope::Document,
                ..
            } => None,
        }
    }
}

/// Every structural problem found in a document, in the order they were found.
#[derive(Debug)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [only] => write!(f, "1 error occurred:\n\t* {only}"),
            errors => {
                write!(f, "{} errors occurred:", errors.len())?;
                errors.iter().try_for_each(|err| write!(f, "\n\t* {err}"))
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn validation_errors(doc: &str) -> Vec<ValidationError> {
        match Config::load(doc).unwrap().validate() {
            Err(Error::Validation(errs)) => errs.into_vec(),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn valid_labels() {
        let labels = labels(&[
            ("env", "production"),
            ("example.com/tier", "frontend"),
            ("a-b.c/d", ""),
        ]);
        assert_eq!(validate_labels(&labels), vec![]);
    }

    #[test]
    fn reserved_prefix_is_a_single_error() {
        let errs = validate_labels(&labels(&[("waypoint/foo", "bar")]));
        assert_eq!(
            errs,
            vec![LabelError::ReservedPrefix {
                key: "waypoint/foo".into()
            }]
        );
    }

    #[test]
    fn long_key_is_a_single_error() {
        let key = "a".repeat(300);
        let errs = validate_labels(&labels(&[(&key, "v")]));
        assert_eq!(errs, vec![LabelError::KeyTooLong { key }]);
    }

    #[test]
    fn long_value() {
        let value = "v".repeat(256);
        let errs = validate_labels(&labels(&[("env", &value)]));
        assert_eq!(errs, vec![LabelError::ValueTooLong { key: "env".into() }]);
        assert!(validate_labels(&labels(&[("env", &"v".repeat(255))])).is_empty());
    }

    #[test]
    fn invalid_hostname_before_slash() {
        for key in ["-bad", "1abc/x", "under_score", "a..b/c", "bad-/x"] {
            let errs = validate_labels(&labels(&[(key, "v")]));
            assert_eq!(
                errs,
                vec![LabelError::InvalidHostname { key: key.into() }],
                "{key}"
            );
        }
    }

    #[test]
    fn every_invalid_label_is_reported() {
        let errs = validate_labels(&labels(&[
            ("waypoint/a", "x"),
            ("ok", "x"),
            ("_bad", "x"),
            ("env", &"v".repeat(300)),
        ]));
        let keys = errs.iter().map(LabelError::key).collect::<Vec<_>>();
        assert_eq!(keys, ["waypoint/a", "_bad", "env"]);
    }

    #[test]
    fn location_from_offset() {
        let source = "a = 1\n[app.web]\n";
        let loc = Location::from_offset(source, 6, None);
        assert_eq!((loc.line, loc.column), (2, 1));
        assert_eq!(loc.to_string(), "2:1");

        let loc = Location::from_offset(source, 4, Some(Path::new("waypoint.toml")));
        assert_eq!(loc.to_string(), "waypoint.toml:1:5");
    }

    #[test]
    fn header_offsets() {
        let source = "project = \"p\"\n  [app.\"web\".build]\n[[app.api.deploy]]\n[app.web]\n";
        let offsets = app_header_offsets(source);
        assert_eq!(offsets.get("web"), Some(&16));
        assert_eq!(offsets.get("api"), Some(&34));
        assert_eq!(offsets.len(), 2);
    }

    #[test]
    fn header_offsets_outside_headers() {
        let source = r#"project = "p" # [app.ignored]
app.dotted.deploy.use = "nomad"
app = { inline = { deploy = { use = "nomad" } } }
[app."a#b".build] # [app.c]
note = """
[app.inside_string]
"""
[app]
nested = { deploy = { use = "x" } }
"#;
        let offsets = app_header_offsets(source);
        let line_of = |name: &str| {
            let offset = offsets[name];
            source[..offset].lines().count() + 1
        };
        assert_eq!(offsets.keys().collect::<Vec<_>>(), ["dotted", "inline", "a#b", "nested"]);
        assert_eq!(line_of("dotted"), 2);
        assert_eq!(line_of("inline"), 3);
        assert_eq!(line_of("a#b"), 4);
        assert_eq!(line_of("nested"), 9);
    }

    #[test]
    fn apps_outside_headers_carry_locations() {
        for (doc, app, line) in [
            ("project = \"p\"\napp.web.build.use = \"docker\"\n", "web", 2),
            ("project = \"p\"\n\n[app.\"a#b\".build] # [app.c]\nuse = \"pack\"\n", "a#b", 3),
        ] {
            let errs = validation_errors(doc);
            match errs.as_slice() {
                [ValidationError::StanzaCount {
                    app: name,
                    location: Some(location),
                    stanza: "deploy",
                    ..
                }] => assert_eq!((name.as_str(), location.line), (app, line)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn missing_project_is_fatal() {
        let config = Config::load("[app.web.build]\nuse = \"x\"\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Schema(_))));

        let config = Config::load("project = \" \"\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::MissingProject)));
    }

    #[test]
    fn unknown_root_field_is_fatal() {
        let config = Config::load("project = \"p\"\nbogus = 1\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Schema(_))));
    }

    #[test]
    fn missing_stanzas_name_the_app() {
        let errs = validation_errors(
            r#"
            project = "p"

            [app.web.build]
            use = "docker"

            [app.api.deploy]
            use = "nomad"
            "#,
        );
        let described = errs
            .iter()
            .map(|err| match err {
                ValidationError::StanzaCount {
                    app, stanza, found, ..
                } => (app.as_str(), *stanza, *found),
                other => panic!("unexpected error {other}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(described, [("web", "deploy", 0), ("api", "build", 0)]);
        assert!(errs[0].to_string().contains("app \"web\""));
    }

    #[test]
    fn both_missing_stanzas_are_reported() {
        let errs = validation_errors(
            r#"
            project = "p"

            [app.web]
            path = "."
            "#,
        );
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|err| err.app() == Some("web")));
    }

    #[test]
    fn duplicate_stanzas_are_counted() {
        let errs = validation_errors(
            r#"
            project = "p"

            [app.web]
            [[app.web.build]]
            use = "docker"
            [[app.web.build]]
            use = "pack"
            [app.web.deploy]
            use = "nomad"
            "#,
        );
        assert!(
            matches!(
                errs.as_slice(),
                [ValidationError::StanzaCount {
                    stanza: "build",
                    found: 2,
                    ..
                }]
            ),
            "{errs:?}"
        );
    }

    #[test]
    fn app_errors_carry_locations() {
        let errs = validation_errors("project = \"p\"\n\n[app.web]\npath = \".\"\n[app.web.deploy]\nuse = \"x\"\n");
        let ValidationError::StanzaCount {
            location: Some(location),
            ..
        } = &errs[0]
        else {
            panic!("unexpected {errs:?}");
        };
        assert_eq!((location.line, location.column), (3, 1));
        assert!(errs[0].to_string().starts_with("3:1: app \"web\""));
    }

    #[test]
    fn app_schema_errors_do_not_stop_other_apps() {
        let errs = validation_errors(
            r#"
            project = "p"

            [app.web]
            unknown = true

            [app.api.build]
            use = "pack"
            "#,
        );
        assert!(matches!(&errs[0], ValidationError::AppSchema { app, .. } if app == "web"));
        assert!(matches!(&errs[1], ValidationError::StanzaCount { app, stanza: "deploy", .. } if app == "api"));
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn stanza_problems() {
        let errs = validation_errors(
            r#"
            project = "p"

            [app.web.build]
            labels = { "waypoint/kind" = "x" }
            [[app.web.build.hook]]
            when = "before"
            command = []
            [app.web.build.registry]
            labels = { ok = "fine" }

            [app.web.deploy]
            use = "nomad"
            "#,
        );
        let messages = errs.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(messages.len(), 4, "{messages:#?}");
        assert!(messages[0].contains("'build' stanza of app \"web\" has no 'use'"));
        assert!(messages[1].contains("'command' must not be empty"));
        assert!(messages[2].starts_with("app \"web\" 'build' labels: label[waypoint/kind]"));
        assert!(messages[3].contains("'registry' stanza of app \"web\" has no 'use'"));
    }

    #[test]
    fn document_labels_are_all_reported_after_app_errors() {
        let errs = validation_errors(
            r#"
            project = "p"

            [labels]
            "waypoint/foo" = "bar"
            "-nope" = "x"

            [app.web.build]
            use = "docker"
            "#,
        );
        assert_eq!(errs.len(), 3);
        assert!(matches!(errs[0], ValidationError::StanzaCount { .. }));
        assert!(matches!(
            &errs[1],
            ValidationError::Label { scope: LabelScope::Document, error: LabelError::ReservedPrefix { key } } if key == "waypoint/foo"
        ));
        assert!(matches!(
            &errs[2],
            ValidationError::Label { error: LabelError::InvalidHostname { .. }, .. }
        ));
    }

    #[test]
    fn no_apps() {
        let errs = validation_errors("project = \"p\"\n");
        assert!(matches!(errs.as_slice(), [ValidationError::NoApps]));
    }

    #[test]
    fn display_lists_every_error() {
        let err = Config::load("project = \"p\"\n[app.web]\n[app.api]\n")
            .unwrap()
            .validate()
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("4 errors occurred:"), "{text}");
        assert_eq!(text.matches("\n\t* ").count(), 4);
    }
}
