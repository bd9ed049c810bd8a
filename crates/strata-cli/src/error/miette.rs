//! Miette conversion for CLI errors.

use ::miette::Report;
use strata_bundler::BundleError;

use super::{BuildError, CliError};

/// Convert a [`CliError`] to a report for display in `main`.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(BuildError::Bundle(e)) => bundle_error_to_miette(e),
        CliError::Resolution(e) => ::miette::miette!("{}", e),
        CliError::Config(e) => ::miette::miette!("Configuration error: {}", e),
        _ => ::miette::miette!("{}", err),
    }
}

fn bundle_error_to_miette(err: BundleError) -> Report {
    match err {
        BundleError::Unresolved {
            specifier,
            importer,
        } => ::miette::miette!(
            "Failed to resolve '{}'\nImported from: {}\n\nHint: Check the relative path and file extension",
            specifier,
            importer.display()
        ),
        other => ::miette::miette!("Build error: {}", other),
    }
}
