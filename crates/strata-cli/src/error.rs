//! Error handling for the Strata CLI.
//!
//! - [`CliError`] is what commands return; domain errors convert into it via `#[from]`.
//! - [`ResolutionError`] aborts before any bundle is constructed.
//! - [`ConfigError`] covers config files and per-bundle options.
//! - [`BuildError`] wraps engine failures and whole-command build outcomes.
//!
//! ```rust,no_run
//! use strata_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .with_hint("Run strata from the project root or pass --cwd")
//! }
//! ```

mod miette;

use std::path::PathBuf;

use thiserror::Error;

pub use self::miette::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}\n\nHint: On Linux, raise fs.inotify.max_user_watches for large trees")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    Custom(String),
}

/// Failures turning arguments and project metadata into build targets.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No build targets match {}\n\nHint: Pass a file path, a directory with a package.json, or a workspace name", .patterns.join(", "))]
    NoTargets { patterns: Vec<String> },

    #[error("Package '{name}' declares nothing to build\n\nHint: Add a lib, module, main, browser or style field to {}/package.json, or pass --output", .root.display())]
    NoBuildableField { name: String, root: PathBuf },

    #[error("Unsupported file type: {}\n\nHint: Strata builds .js/.ts/.jsx/.tsx, .css/.scss/.sass, .html, .webmanifest and .png/.ico/.svg files", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("Linked packages depend on each other in a cycle: {}\n\nHint: Break the cycle or narrow --link", .packages.join(" -> "))]
    LinkCycle { packages: Vec<String> },

    #[error("Bundles '{first}' and '{second}' both write {}\n\nHint: Build them separately or drop --output so each uses its own output field", .path.display())]
    AmbiguousOutput {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Invalid package.json at {}: {message}", .path.display())]
    InvalidPackage { path: PathBuf, message: String },
}

/// Configuration file and option errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}\n\nHint: Create strata.json in the project root or fix the --config path", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}\n\nHint: Check strata.json syntax and STRATA_* environment variables")]
    Load(String),

    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },
}

impl From<strata_bundler::ConfigError> for ConfigError {
    fn from(err: strata_bundler::ConfigError) -> Self {
        match err {
            strata_bundler::ConfigError::MissingField { field, hint } => {
                ConfigError::MissingField { field, hint }
            }
            strata_bundler::ConfigError::InvalidValue { field, value, hint } => {
                ConfigError::InvalidValue { field, value, hint }
            }
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Bundle(#[from] strata_bundler::BundleError),

    #[error("No bundle could be constructed\n\nHint: Fix the configuration errors above")]
    NoBundles,

    #[error("{failed} of {total} bundles failed to build")]
    Failed { failed: usize, total: usize },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{err}\n\nHint: {hint}"))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{msg}: {err}"))
        })
    }
}
