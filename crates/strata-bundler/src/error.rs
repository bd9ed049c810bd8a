//! Error types for bundle setup, build and write.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

/// A bundle configuration that cannot be frozen.
///
/// Raised by [`crate::Bundle::setup`]. It is fatal to the construction of that
/// one bundle only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required option '{field}'\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Bundle has not been set up\n\nHint: call setup() before build()")]
    NotSetUp,

    #[error("Cannot resolve '{specifier}' imported from {}", .importer.display())]
    Unresolved { specifier: String, importer: PathBuf },

    #[error("Build failed for {input}: {message}")]
    Build { input: String, message: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}\n\nHint: Check output directory permissions", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Nothing to write: the bundle has no successful build yet")]
    NothingToWrite,
}

impl BundleError {
    /// Whether this error happened while persisting output rather than building.
    pub fn is_write_error(&self) -> bool {
        matches!(self, BundleError::Write { .. } | BundleError::NothingToWrite)
    }
}
