//! Reverse mapping from source files to the bundles that consume them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_bundler::{normalize, Bundle, BundleId};

#[derive(Debug, Default)]
struct IndexInner {
    by_path: FxHashMap<PathBuf, IndexSet<BundleId>>,
    by_bundle: FxHashMap<BundleId, FxHashSet<PathBuf>>,
}

/// Absolute path → bundles depending on it.
///
/// Entries for a bundle are replaced wholesale on every [`update`](Self::update),
/// so files a bundle no longer imports stop triggering it.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    inner: RwLock<IndexInner>,
    populated: AtomicBool,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh entries for `bundle` from its current `files`.
    pub fn update(&self, bundle: &Bundle) {
        self.replace(bundle.id(), bundle.files().iter().map(PathBuf::as_path));
    }

    /// Replace every entry for `id` with `files`.
    pub fn replace<'a>(&self, id: BundleId, files: impl IntoIterator<Item = &'a Path>) {
        let files: FxHashSet<PathBuf> = files.into_iter().map(normalize).collect();

        let mut inner = self.inner.write();
        if let Some(previous) = inner.by_bundle.remove(&id) {
            for path in previous.difference(&files) {
                if let Some(bundles) = inner.by_path.get_mut(path) {
                    bundles.shift_remove(&id);
                    if bundles.is_empty() {
                        inner.by_path.remove(path);
                    }
                }
            }
        }
        for path in &files {
            inner.by_path.entry(path.clone()).or_default().insert(id);
        }

        tracing::debug!(bundle = %id, files = files.len(), "dependency index updated");
        inner.by_bundle.insert(id, files);
    }

    pub fn remove(&self, id: BundleId) {
        let mut inner = self.inner.write();
        if let Some(previous) = inner.by_bundle.remove(&id) {
            for path in previous {
                if let Some(bundles) = inner.by_path.get_mut(&path) {
                    bundles.shift_remove(&id);
                    if bundles.is_empty() {
                        inner.by_path.remove(&path);
                    }
                }
            }
        }
    }

    /// Bundles depending on `path`, in registration order.
    pub fn lookup(&self, path: &Path) -> IndexSet<BundleId> {
        let key = normalize(path);
        self.inner
            .read()
            .by_path
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        let key = normalize(path);
        self.inner.read().by_path.contains_key(&key)
    }

    /// Number of distinct tracked paths.
    pub fn len(&self) -> usize {
        self.inner.read().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the initial build has registered every bundle.
    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::Acquire)
    }

    pub fn mark_populated(&self) {
        self.populated.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| dir.join(n)).collect()
    }

    #[test]
    fn test_update_replaces_entries() {
        let index = DependencyIndex::new();
        let a = BundleId::next();
        let root = Path::new("/virtual/project");

        let first = paths(root, &["src/a.js", "src/util.js"]);
        index.replace(a, first.iter().map(PathBuf::as_path));
        assert!(index.contains(&root.join("src/util.js")));

        let second = paths(root, &["src/a.js", "src/other.js"]);
        index.replace(a, second.iter().map(PathBuf::as_path));
        assert!(!index.contains(&root.join("src/util.js")));
        assert!(index.contains(&root.join("src/other.js")));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_fan_out_lookup() {
        let index = DependencyIndex::new();
        let a = BundleId::next();
        let b = BundleId::next();
        let root = Path::new("/virtual/project");
        let shared = root.join("src/theme.css");

        index.replace(a, [shared.as_path(), root.join("a.css").as_path()]);
        index.replace(b, [shared.as_path()]);

        let hits: Vec<_> = index.lookup(&shared).into_iter().collect();
        assert_eq!(hits, vec![a, b]);

        index.remove(a);
        let hits: Vec<_> = index.lookup(&shared).into_iter().collect();
        assert_eq!(hits, vec![b]);
        assert!(!index.contains(&root.join("a.css")));
    }

    #[test]
    fn test_keys_follow_canonical_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.js"), "").unwrap();

        let index = DependencyIndex::new();
        let id = BundleId::next();
        index.replace(id, [dir.path().join("src/./a.js").as_path()]);

        assert!(index.contains(&dir.path().join("src/a.js")));

        fs::remove_file(dir.path().join("src/a.js")).unwrap();
        assert!(index.contains(&dir.path().join("src/a.js")));
    }

    #[test]
    fn test_populated_flag() {
        let index = DependencyIndex::new();
        assert!(!index.is_populated());
        index.mark_populated();
        assert!(index.is_populated());
    }
}
