//! Shared utilities for command implementations.

use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};
use crate::project::find_package_json;
use crate::ui;

/// Resolve a path relative to a working directory.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Resolves the project root directory.
///
/// Resolution priority (highest to lowest):
/// 1. Explicit `--cwd` flag if provided
/// 2. The current directory when entries were given, since they are
///    relative to it
/// 3. Nearest package.json walking up from the current directory
/// 4. The current directory
///
/// # Errors
/// - Explicit cwd doesn't exist or isn't a directory
/// - Cannot determine current working directory
pub fn resolve_project_root(explicit_cwd: Option<&Path>, has_entries: bool) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(CliError::Io)?;

    if let Some(cwd_path) = explicit_cwd {
        let absolute = resolve_path(cwd_path, &current_dir);

        if !absolute.exists() {
            return Err(CliError::InvalidArgument(format!(
                "Specified --cwd directory does not exist: {}",
                absolute.display()
            )));
        }

        if !absolute.is_dir() {
            return Err(CliError::InvalidArgument(format!(
                "Specified --cwd is not a directory: {}",
                absolute.display()
            )));
        }

        ui::info(&format!(
            "Using project root: {} (from --cwd flag)",
            absolute.display()
        ));
        return Ok(absolute);
    }

    if has_entries {
        return Ok(current_dir);
    }

    if let Some(package_root) = find_package_json(&current_dir) {
        if package_root != current_dir {
            ui::info(&format!(
                "Using project root: {} (auto-detected from package.json)",
                package_root.display()
            ));
        }
        return Ok(package_root);
    }

    Ok(current_dir)
}
