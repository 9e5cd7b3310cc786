//! Configuration primitives and loader for html-toc.
//!
//! Settings are resolved from a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Each layer only overrides the keys it sets, and every resolved value
//! remembers which layer it came from so validation errors can point at it.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".html-toc.toml";
pub const DEFAULT_PLACEHOLDER: &str = "[toc]";
pub const DEFAULT_CONTAINER_CLASS: &str = "toc";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub toc: TocSettings,
    pub sources: ConfigSources,
}

/// Settings that govern TOC rendering and placeholder substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocSettings {
    pub placeholder: String,
    pub container_class: String,
    pub skip_title: bool,
}

impl Default for TocSettings {
    fn default() -> Self {
        TocSettings {
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
            container_class: DEFAULT_CONTAINER_CLASS.to_owned(),
            skip_title: true,
        }
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
}

impl ConfigSource {
    fn builtin() -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        ConfigSource {
            kind,
            path: Some(path),
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let git_config = find_git_root(&working_dir).map(|root| root.join(CONFIG_FILE_NAME));
        let local_config = working_dir.join(CONFIG_FILE_NAME);

        // A file reachable through several kinds is applied once, at its highest precedence.
        let discovered = [
            git_config
                .filter(|path| *path != local_config)
                .map(|path| (ConfigSourceKind::GitRoot, path)),
            Some((ConfigSourceKind::Local, local_config)),
        ];
        let mut layered: Vec<(ConfigSourceKind, PathBuf)> = discovered
            .into_iter()
            .flatten()
            .filter(|(_, path)| path.exists() && override_path.as_ref() != Some(path))
            .collect();
        layered.extend(override_path.map(|path| (ConfigSourceKind::Override, path)));

        let mut merged = TocPartial::defaults(ConfigSource::builtin());
        let mut source_layers = vec![ConfigSource::builtin()];
        for (kind, path) in layered {
            let source = ConfigSource::for_file(kind, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let toc = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            toc,
            sources: ConfigSources {
                working_directory: working_dir,
                layers: source_layers,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            toc: TocSettings::default(),
            sources: ConfigSources {
                working_directory: PathBuf::from("."),
                layers: vec![ConfigSource::builtin()],
            },
        }
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<TocPartial, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })?;
    Ok(raw.toc.map(|toc| toc.into_partial(source)).unwrap_or_default())
}

#[derive(Clone, Debug, Default)]
struct TocPartial {
    placeholder: Option<Located<String>>,
    container_class: Option<Located<String>>,
    skip_title: Option<Located<bool>>,
}

impl TocPartial {
    fn defaults(source: ConfigSource) -> Self {
        let settings = TocSettings::default();
        TocPartial {
            placeholder: Some(Located::new(settings.placeholder, source.clone())),
            container_class: Some(Located::new(settings.container_class, source.clone())),
            skip_title: Some(Located::new(settings.skip_title, source)),
        }
    }

    fn merge(&mut self, other: TocPartial) {
        if other.placeholder.is_some() {
            self.placeholder = other.placeholder;
        }
        if other.container_class.is_some() {
            self.container_class = other.container_class;
        }
        if other.skip_title.is_some() {
            self.skip_title = other.skip_title;
        }
    }

    fn finalize(self) -> Result<TocSettings, ConfigValidationErrors> {
        let mut errors = Vec::new();
        let defaults = TocSettings::default();

        let placeholder = self
            .placeholder
            .unwrap_or_else(|| Located::new(defaults.placeholder, ConfigSource::builtin()));
        if placeholder.value.trim().is_empty() {
            errors.push(
                ConfigValidationError::new(
                    Some(placeholder.source.clone()),
                    "placeholder cannot be empty".into(),
                )
                .with_context("toc.placeholder"),
            );
        }

        let container_class = self
            .container_class
            .unwrap_or_else(|| Located::new(defaults.container_class, ConfigSource::builtin()));
        if container_class.value.trim().is_empty() {
            errors.push(
                ConfigValidationError::new(
                    Some(container_class.source.clone()),
                    "container class cannot be empty".into(),
                )
                .with_context("toc.container_class"),
            );
        }

        let skip_title = self
            .skip_title
            .map(|located| located.value)
            .unwrap_or(defaults.skip_title);

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(TocSettings {
            placeholder: placeholder.value,
            container_class: container_class.value,
            skip_title,
        })
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

/// Container for validation failures, formatted as a bullet list.
#[derive(Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }
}

/// Validation failure with optional provenance.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
    pub context: Option<String>,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError {
            source,
            message,
            context: None,
        }
    }

    fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source.describe())?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    toc: Option<RawToc>,
}

#[derive(Debug, Deserialize)]
struct RawToc {
    #[serde(default)]
    placeholder: Option<String>,
    #[serde(default)]
    container_class: Option<String>,
    #[serde(default)]
    skip_title: Option<bool>,
}

impl RawToc {
    fn into_partial(self, source: ConfigSource) -> TocPartial {
        TocPartial {
            placeholder: self
                .placeholder
                .map(|value| Located::new(value, source.clone())),
            container_class: self
                .container_class
                .map(|value| Located::new(value, source.clone())),
            skip_title: self.skip_title.map(|value| Located::new(value, source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_override_only_the_keys_they_set() {
        let mut merged = TocPartial::defaults(ConfigSource::builtin());
        let local = ConfigSource::for_file(
            ConfigSourceKind::Local,
            PathBuf::from("/x/.html-toc.toml"),
        );
        merged.merge(TocPartial {
            container_class: Some(Located::new("contents".into(), local)),
            ..TocPartial::default()
        });

        let settings = merged.finalize().expect("valid settings");
        assert_eq!(settings.placeholder, "[toc]");
        assert_eq!(settings.container_class, "contents");
        assert!(settings.skip_title);
    }

    #[test]
    fn validation_errors_name_their_layer() {
        let local = ConfigSource::for_file(
            ConfigSourceKind::Local,
            PathBuf::from("/x/.html-toc.toml"),
        );
        let mut merged = TocPartial::defaults(ConfigSource::builtin());
        merged.merge(TocPartial {
            placeholder: Some(Located::new("  ".into(), local)),
            ..TocPartial::default()
        });

        let errors = merged.finalize().expect_err("blank placeholder rejected");
        assert_eq!(
            errors.to_string(),
            "- toc.placeholder: placeholder cannot be empty (local config at /x/.html-toc.toml)"
        );
    }
}
