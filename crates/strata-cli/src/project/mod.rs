//! Projects and monorepo workspaces.
//!
//! A [`Project`] is a directory holding a `package.json`. A project whose
//! manifest declares `workspaces` is a monorepo; its workspaces are the
//! directories matched by those globs that contain a `package.json` of their own.

mod package_json;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ResolutionError, Result, ResultExt};

pub use package_json::{PackageJson, Workspaces};

pub const PACKAGE_JSON: &str = "package.json";

/// Version range prefixes that point at a local package.
const LOCAL_PROTOCOLS: &[&str] = &["workspace:", "link:", "file:"];

#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    manifest: PackageJson,
}

impl Project {
    /// Load the project rooted at `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PACKAGE_JSON);
        let text = std::fs::read_to_string(&path).with_path(&path)?;
        let manifest: PackageJson =
            serde_json::from_str(&text).map_err(|e| ResolutionError::InvalidPackage {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            root: dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            manifest,
        })
    }

    /// Like [`Project::load`], but `None` when `root` has no `package.json`.
    pub fn try_load(root: &Path) -> Result<Option<Self>> {
        if root.join(PACKAGE_JSON).is_file() {
            Self::load(root).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &PackageJson {
        &self.manifest
    }

    /// Declared name, or the directory name for anonymous packages.
    pub fn name(&self) -> String {
        self.manifest.name.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    pub fn is_monorepo(&self) -> bool {
        self.manifest
            .workspaces
            .as_ref()
            .is_some_and(|w| !w.patterns().is_empty())
    }

    /// Workspace packages in path order. Patterns starting with `!` exclude.
    pub fn workspaces(&self) -> Result<Vec<Project>> {
        let Some(workspaces) = &self.manifest.workspaces else {
            return Ok(Vec::new());
        };

        let (exclude, include): (Vec<&String>, Vec<&String>) = workspaces
            .patterns()
            .iter()
            .partition(|p| p.starts_with('!'));
        let include: Vec<String> = include.iter().map(|p| normalize_glob(p)).collect();
        let exclude: Vec<String> = exclude
            .iter()
            .map(|p| normalize_glob(&p[1..]))
            .collect();

        let mut packages = Vec::new();
        for dir in walk_dirs(&self.root) {
            let relative = relative_slash(&self.root, &dir);
            if relative.is_empty() {
                continue;
            }
            let included = include.iter().any(|g| fast_glob::glob_match(g, &relative));
            let excluded = exclude.iter().any(|g| fast_glob::glob_match(g, &relative));
            if included && !excluded && dir.join(PACKAGE_JSON).is_file() {
                packages.push(Project::load(&dir)?);
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            count = packages.len(),
            "expanded workspaces"
        );
        Ok(packages)
    }

    /// Dependencies declared with a local protocol, as `(name, directory)` when
    /// the version carries a path. `workspace:` versions resolve by name and yield `None`.
    pub fn local_dependencies(&self) -> Vec<(String, Option<PathBuf>)> {
        self.manifest
            .all_dependencies()
            .filter_map(|(name, version)| {
                let protocol = LOCAL_PROTOCOLS.iter().find(|p| version.starts_with(**p))?;
                let target = &version[protocol.len()..];
                let path = (*protocol != "workspace:").then(|| self.root.join(target));
                Some((name.clone(), path))
            })
            .collect()
    }

    /// Names of every declared dependency.
    pub fn dependency_names(&self) -> impl Iterator<Item = &String> {
        self.manifest.all_dependencies().map(|(name, _)| name)
    }
}

/// Walk up from `start_dir` to the nearest directory holding a `package.json`.
pub fn find_package_json(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .find(|dir| dir.join(PACKAGE_JSON).is_file())
        .map(Path::to_path_buf)
}

/// The monorepo enclosing `start_dir`, which may be `start_dir` itself.
pub fn find_monorepo(start_dir: &Path) -> Result<Option<Project>> {
    for dir in start_dir.ancestors() {
        if let Some(project) = Project::try_load(dir)? {
            if project.is_monorepo() {
                return Ok(Some(project));
            }
        }
    }
    Ok(None)
}

/// Directories under `root`, skipping dependencies and hidden folders.
pub(crate) fn walk_dirs(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
}

/// Files under `root`, skipping dependencies and hidden folders.
pub(crate) fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n == "node_modules" || n.starts_with('.'))
}

/// `path` relative to `root`, joined with forward slashes for glob matching.
pub(crate) fn relative_slash(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Trim `./` and trailing slashes so globs compare against relative paths.
pub(crate) fn normalize_glob(pattern: &str) -> String {
    pattern
        .trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}
