//! Bundle configuration variants.
//!
//! Every bundler kind takes its own options struct, all of which embed the
//! shared [`BaseOptions`]. The whole thing is wrapped in [`BundleConfig`] so a
//! [`crate::Bundle`] can be set up uniformly regardless of kind.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The family of engine a bundle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundlerKind {
    Script,
    Style,
    Markup,
    Manifest,
    Icon,
}

impl BundlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundlerKind::Script => "script",
            BundlerKind::Style => "style",
            BundlerKind::Markup => "markup",
            BundlerKind::Manifest => "manifest",
            BundlerKind::Icon => "icon",
        }
    }
}

impl std::fmt::Display for BundlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for script bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Esm,
    Cjs,
    Iife,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Esm => "esm",
            Format::Cjs => "cjs",
            Format::Iife => "iife",
        }
    }
}

/// Target platform environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Browser,
    Node,
}

/// One bundle input: a file on disk or source text supplied directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    File(PathBuf),
    /// Inline source. Relative imports resolve against `root`.
    Inline { code: String, root: PathBuf },
}

impl InputSource {
    pub fn file(&self) -> Option<&Path> {
        match self {
            InputSource::File(path) => Some(path),
            InputSource::Inline { .. } => None,
        }
    }

    pub fn inline_code(&self) -> Option<&str> {
        match self {
            InputSource::File(_) => None,
            InputSource::Inline { code, .. } => Some(code),
        }
    }

    /// Human-readable reference used in lifecycle events.
    pub fn describe(&self) -> String {
        match self {
            InputSource::File(path) => path.display().to_string(),
            InputSource::Inline { root, .. } => format!("<inline> in {}", root.display()),
        }
    }
}

/// Options shared by every bundler kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseOptions {
    pub input: Vec<InputSource>,
    pub output: Option<PathBuf>,
    /// Project root the bundle belongs to.
    pub root: PathBuf,
    /// Browserslist-style targets query, passed through to engines.
    pub targets: Option<String>,
    pub production: bool,
    pub map: bool,
    pub lint: bool,
}

impl Default for BaseOptions {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            output: None,
            root: PathBuf::from("."),
            targets: None,
            production: false,
            map: true,
            lint: true,
        }
    }
}

impl BaseOptions {
    /// Single file input writing to `output`.
    pub fn file(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: vec![InputSource::File(input.into())],
            output: Some(output.into()),
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Entry file paths, skipping inline inputs.
    pub fn input_files(&self) -> impl Iterator<Item = &Path> {
        self.input.iter().filter_map(InputSource::file)
    }

    /// Resolve a possibly relative path against the bundle root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn validate(&self, kind: BundlerKind) -> Result<(), ConfigError> {
        if self.input.is_empty() {
            return Err(ConfigError::MissingField {
                field: "input".to_string(),
                hint: format!("A {kind} bundle needs at least one input file"),
            });
        }

        if self.output.is_none() {
            return Err(ConfigError::MissingField {
                field: "output".to_string(),
                hint: "Pass --output or declare an output field in package.json".to_string(),
            });
        }

        let inline_allowed = matches!(kind, BundlerKind::Script | BundlerKind::Style);
        if !inline_allowed && self.input.iter().any(|i| i.inline_code().is_some()) {
            return Err(ConfigError::InvalidValue {
                field: "input".to_string(),
                value: "<inline>".to_string(),
                hint: format!("{kind} bundles only accept file inputs"),
            });
        }

        Ok(())
    }
}

/// JSX pragma settings for script bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsxOptions {
    pub factory: Option<String>,
    pub fragment: Option<String>,
    pub import_source: Option<String>,
}

impl JsxOptions {
    pub fn is_empty(&self) -> bool {
        self.factory.is_none() && self.fragment.is_none() && self.import_source.is_none()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fragment.is_some() && self.factory.is_none() && self.import_source.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "jsx.fragment".to_string(),
                value: self.fragment.clone().unwrap_or_default(),
                hint: "Set --jsx-factory or --jsx-import-source alongside --jsx-fragment"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOptions {
    #[serde(flatten)]
    pub base: BaseOptions,
    pub format: Format,
    pub platform: Platform,
    pub jsx: JsxOptions,
}

impl ScriptOptions {
    pub fn new(base: BaseOptions) -> Self {
        Self {
            base,
            format: Format::default(),
            platform: Platform::default(),
            jsx: JsxOptions::default(),
        }
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleOptions {
    #[serde(flatten)]
    pub base: BaseOptions,
    /// Extra directories searched for bare `@import` specifiers.
    pub include_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupOptions {
    #[serde(flatten)]
    pub base: BaseOptions,
}

/// Fields of a web manifest replaced at build time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestOverrides {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub start_url: Option<String>,
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestOptions {
    #[serde(flatten)]
    pub base: BaseOptions,
    pub overrides: ManifestOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconOptions {
    #[serde(flatten)]
    pub base: BaseOptions,
    /// File names the source icon is written under, inside the output directory.
    pub names: Vec<String>,
}

impl IconOptions {
    pub fn new(base: BaseOptions) -> Self {
        Self {
            base,
            names: default_icon_names(),
        }
    }
}

fn default_icon_names() -> Vec<String> {
    vec!["favicon.png".to_string(), "apple-touch-icon.png".to_string()]
}

/// Frozen configuration for one bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BundleConfig {
    Script(ScriptOptions),
    Style(StyleOptions),
    Markup(MarkupOptions),
    Manifest(ManifestOptions),
    Icon(IconOptions),
}

impl BundleConfig {
    pub fn kind(&self) -> BundlerKind {
        match self {
            BundleConfig::Script(_) => BundlerKind::Script,
            BundleConfig::Style(_) => BundlerKind::Style,
            BundleConfig::Markup(_) => BundlerKind::Markup,
            BundleConfig::Manifest(_) => BundlerKind::Manifest,
            BundleConfig::Icon(_) => BundlerKind::Icon,
        }
    }

    pub fn base(&self) -> &BaseOptions {
        match self {
            BundleConfig::Script(o) => &o.base,
            BundleConfig::Style(o) => &o.base,
            BundleConfig::Markup(o) => &o.base,
            BundleConfig::Manifest(o) => &o.base,
            BundleConfig::Icon(o) => &o.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseOptions {
        match self {
            BundleConfig::Script(o) => &mut o.base,
            BundleConfig::Style(o) => &mut o.base,
            BundleConfig::Markup(o) => &mut o.base,
            BundleConfig::Manifest(o) => &mut o.base,
            BundleConfig::Icon(o) => &mut o.base,
        }
    }

    /// Output path, present once the config has been validated.
    pub fn output(&self) -> Option<&Path> {
        self.base().output.as_deref()
    }

    /// Check mandatory options and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base().validate(self.kind())?;

        match self {
            BundleConfig::Script(o) => o.jsx.validate(),
            BundleConfig::Icon(o) if o.names.is_empty() => Err(ConfigError::MissingField {
                field: "names".to_string(),
                hint: "Give the icon bundle at least one output file name".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
