//! Layered build configuration.
//!
//! Merges settings from CLI flags, `STRATA_*` environment variables and
//! `strata.json`. Priority: CLI > Environment > File > Defaults

mod conversions;
mod defaults;
mod loading;
mod tests;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cli::Format;

pub use defaults::*;

/// Name of the project config file looked up in the project root.
pub const CONFIG_FILE: &str = "strata.json";

/// Build configuration shared by every bundle of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Output file or directory overriding package.json fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Script format used when `output` is set
    #[serde(default = "default_format")]
    pub format: Format,

    /// Browserslist-style targets query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<String>,

    #[serde(default)]
    pub production: bool,

    /// Emit source maps
    #[serde(default = "default_true")]
    pub map: bool,

    /// Report lint warnings
    #[serde(default = "default_true")]
    pub lint: bool,

    #[serde(default)]
    pub jsx: JsxConfig,

    /// Debounce window for watch mode, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Path segments or globs the watcher ignores
    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,

    /// Port for --serve
    #[serde(default = "default_port")]
    pub port: u16,

    /// Linked dependency patterns; an empty list links every local dependency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Vec<String>>,

    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsxConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_source: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: default_format(),
            targets: None,
            production: false,
            map: true,
            lint: true,
            jsx: JsxConfig::default(),
            debounce_ms: default_debounce_ms(),
            watch_ignore: default_watch_ignore(),
            port: default_port(),
            link: None,
            recursive: false,
        }
    }
}

impl BuildConfig {
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}
