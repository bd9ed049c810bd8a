//! Relative specifier resolution shared by the engines.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

pub(crate) const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"];

/// Canonical form of `path`, used as the key for every file a bundle depends on.
///
/// A path that no longer exists is canonicalized through its parent directory,
/// and failing that cleaned lexically.
pub fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }
    let cleaned = path.clean();
    let reparented = match (cleaned.parent(), cleaned.file_name()) {
        (Some(parent), Some(name)) => dunce::canonicalize(parent).ok().map(|p| p.join(name)),
        _ => None,
    };
    reparented.unwrap_or(cleaned)
}

pub(crate) fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "."
}

/// Resolve a relative script specifier the way node does for local files:
/// exact path, then each known extension, then an `index` file in a directory.
pub(crate) fn resolve_script(importer: &Path, specifier: &str) -> Option<PathBuf> {
    let base = importer.parent()?.join(specifier);

    if base.is_file() {
        return Some(normalize(&base));
    }

    for ext in SCRIPT_EXTENSIONS {
        let candidate = append_extension(&base, ext);
        if candidate.is_file() {
            return Some(normalize(&candidate));
        }
    }

    if base.is_dir() {
        for ext in SCRIPT_EXTENSIONS {
            let candidate = base.join(format!("index.{ext}"));
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }
    }

    None
}

/// Resolve a stylesheet import, probing sass partials and extensions.
///
/// `dirs` are searched in order: the importing sheet's directory first, then
/// any include paths.
pub(crate) fn resolve_style(dirs: &[PathBuf], specifier: &str) -> Option<PathBuf> {
    let spec = Path::new(specifier);
    let file_name = spec.file_name()?.to_string_lossy().into_owned();
    let parent = spec.parent().unwrap_or_else(|| Path::new(""));
    let has_extension = spec.extension().is_some();

    let mut names = vec![file_name.clone()];
    if !has_extension {
        for ext in ["scss", "sass", "css"] {
            names.push(format!("{file_name}.{ext}"));
        }
    }
    let partials: Vec<String> = names.iter().map(|n| format!("_{n}")).collect();
    names.extend(partials);

    for dir in dirs {
        for name in &names {
            let candidate = dir.join(parent).join(name);
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }
    }

    None
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
