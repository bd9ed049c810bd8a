//! Watch mode: dependency index, change watcher and rebuild scheduler.
//!
//! A [`WatchSession`] is attached before the initial build so that changes
//! made while it runs are not lost, then started once every bundle has a
//! file list. Starting populates the [`DependencyIndex`] and from then on
//! the watcher only forwards paths some bundle depends on.

mod index;
mod scheduler;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use index::DependencyIndex;
pub use scheduler::{RebuildOutcome, RebuildScheduler};
pub use watcher::{ChangeKind, ChangeWatcher, FileChange, IgnoreRules, SkipFn};

use crate::commands::SharedBundle;
use crate::error::Result;
use crate::ui;

/// Watcher running ahead of the initial build; changes are buffered.
#[derive(Debug)]
pub struct WatchSession {
    index: Arc<DependencyIndex>,
    watcher: ChangeWatcher,
    changes: mpsc::UnboundedReceiver<FileChange>,
}

/// Watcher feeding a live scheduler. Dropping it stops watching but lets
/// running cycles finish; [`shutdown`](Self::shutdown) waits for them.
#[derive(Debug)]
pub struct ActiveWatch {
    watcher: ChangeWatcher,
    scheduler: RebuildScheduler,
    forward: JoinHandle<()>,
    outcomes: JoinHandle<()>,
}

impl WatchSession {
    /// Start watching `root`, ignoring `ignore` on top of the built-in rules.
    pub fn attach(root: &Path, ignore: &[String]) -> Result<Self> {
        let index = Arc::new(DependencyIndex::new());
        let rules = IgnoreRules::new(root, ignore);

        let skip_index = Arc::clone(&index);
        let skip: SkipFn =
            Arc::new(move |path: &Path| skip_index.is_populated() && !skip_index.contains(path));

        let (watcher, changes) = ChangeWatcher::start(root, rules, skip)?;
        Ok(Self {
            index,
            watcher,
            changes,
        })
    }

    pub fn index(&self) -> &Arc<DependencyIndex> {
        &self.index
    }

    /// Index every bundle's files and start rebuilding on change. Changes
    /// buffered since [`attach`](Self::attach) are replayed.
    pub async fn start(self, bundles: &[SharedBundle], debounce: Duration) -> ActiveWatch {
        let mut registered = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            let guard = bundle.lock().await;
            self.index.update(&guard);
            registered.push((guard.id(), Arc::clone(bundle)));
        }
        self.index.mark_populated();
        tracing::debug!(
            bundles = registered.len(),
            paths = self.index.len(),
            "dependency index populated"
        );

        let (scheduler, mut outcomes_rx) =
            RebuildScheduler::new(Arc::clone(&self.index), registered, debounce);

        let mut changes = self.changes;
        let forward_to = scheduler.clone();
        let forward = tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                forward_to.on_change(change.path);
            }
        });

        let outcomes = tokio::spawn(async move {
            while let Some(outcome) = outcomes_rx.recv().await {
                match outcome.result {
                    Ok(()) => tracing::debug!(
                        bundle = %outcome.bundle,
                        paths = outcome.paths.len(),
                        "rebuild finished"
                    ),
                    Err(_) => ui::info(&format!(
                        "Waiting for changes; {} changed file(s) kept for the next rebuild",
                        outcome.paths.len()
                    )),
                }
            }
        });

        ActiveWatch {
            watcher: self.watcher,
            scheduler,
            forward,
            outcomes,
        }
    }
}

impl ActiveWatch {
    pub fn root(&self) -> &Path {
        self.watcher.root()
    }

    pub fn scheduler(&self) -> &RebuildScheduler {
        &self.scheduler
    }

    /// Stop watching, then wait for scheduled and running cycles to finish.
    pub async fn shutdown(self) {
        let ActiveWatch {
            watcher,
            scheduler,
            forward,
            outcomes,
        } = self;

        drop(watcher);
        forward.abort();
        scheduler.wait_idle().await;
        outcomes.abort();
        tracing::debug!("watch stopped");
    }
}

/// Deepest directory containing `root` and every path in `paths`.
pub fn watch_root<'a>(root: &Path, paths: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut common = root.to_path_buf();
    for path in paths {
        while !path.starts_with(&common) {
            match common.parent() {
                Some(parent) => common = parent.to_path_buf(),
                None => break,
            }
        }
    }
    common
}
