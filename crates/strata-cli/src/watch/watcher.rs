//! File system watcher scoped to the project root.
//!
//! Raw `notify` events are classified, filtered through the static ignore
//! rules and the caller's skip predicate, and forwarded over a channel.
//! Debouncing is the scheduler's job, not the watcher's.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// Directory names that are never watched.
const ALWAYS_IGNORED: &[&str] = &["node_modules", ".git"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Modify => "modify",
            ChangeKind::Remove => "unlink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Static ignore rules: paths outside the root, `node_modules`, `.git` and
/// the configured `watch_ignore` entries. Plain entries match any path
/// segment; entries with glob characters match the root-relative path or
/// the file name.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    segments: Vec<String>,
    globs: Vec<String>,
}

impl IgnoreRules {
    pub fn new(root: &Path, patterns: &[String]) -> Self {
        let mut segments: Vec<String> = ALWAYS_IGNORED.iter().map(|s| s.to_string()).collect();
        let mut globs = Vec::new();
        for pattern in patterns {
            let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
            if pattern.contains(['*', '?', '[', '{']) {
                globs.push(pattern.to_string());
            } else if !segments.iter().any(|s| s == pattern) {
                segments.push(pattern.to_string());
            }
        }

        Self {
            root: root.to_path_buf(),
            segments,
            globs,
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };

        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts
            .iter()
            .any(|part| self.segments.iter().any(|s| s == part))
        {
            return true;
        }

        let relative = parts.join("/");
        let file_name = parts.last().map(String::as_str).unwrap_or_default();
        self.globs.iter().any(|g| {
            fast_glob::glob_match(g, &relative) || fast_glob::glob_match(g, file_name)
        })
    }
}

/// Skip predicate consulted for every event; `true` drops the event.
pub type SkipFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Keeps the underlying `notify` watcher alive; dropping it stops watching.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    /// Watch `root` recursively. Events not rejected by `rules` or `skip`
    /// arrive on the returned receiver.
    pub fn start(
        root: &Path,
        rules: IgnoreRules,
        skip: SkipFn,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FileChange>)> {
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root.to_path_buf()));
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    return;
                }
            };

            for change in classify(&event) {
                if rules.is_ignored(&change.path) || skip(&change.path) {
                    tracing::trace!(path = %change.path.display(), "change skipped");
                    continue;
                }
                tracing::debug!(
                    kind = change.kind.as_str(),
                    path = %change.path.display(),
                    "file changed"
                );
                if tx.send(change).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), "watching");

        Ok((
            Self {
                _watcher: watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map a raw event to file changes. Renames report each path involved, as a
/// create when it exists afterwards and as an unlink otherwise.
fn classify(event: &Event) -> Vec<FileChange> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| FileChange {
                    kind: if p.exists() {
                        ChangeKind::Create
                    } else {
                        ChangeKind::Remove
                    },
                    path: p.clone(),
                })
                .collect();
        }
        EventKind::Modify(_) => ChangeKind::Modify,
        EventKind::Remove(_) => ChangeKind::Remove,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .filter(|p| !p.is_dir())
        .map(|p| FileChange {
            kind,
            path: p.clone(),
        })
        .collect()
}
