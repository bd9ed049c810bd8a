//! Debounced, per-bundle serialized rebuilds.
//!
//! Changes accumulate in a buffer until the debounce window passes without a
//! new change. The batch is then mapped through the [`DependencyIndex`] and
//! every affected bundle gets one `build → write → index update` cycle.
//! A bundle has at most one chain running; batches that hit a running bundle
//! are parked in its pending set and picked up by exactly one follow-up cycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strata_bundler::{BundleError, BundleId};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::DependencyIndex;
use crate::commands::SharedBundle;

/// Result of one finished rebuild cycle.
#[derive(Debug)]
pub struct RebuildOutcome {
    pub bundle: BundleId,
    /// Invalidated paths the cycle was run with
    pub paths: Vec<PathBuf>,
    pub result: Result<(), BundleError>,
}

#[derive(Debug, Default)]
struct BundleRunState {
    running: bool,
    pending: IndexSet<PathBuf>,
}

struct Shared {
    index: Arc<DependencyIndex>,
    bundles: FxHashMap<BundleId, SharedBundle>,
    debounce: Duration,
    buffer: Mutex<IndexSet<PathBuf>>,
    /// Flushes between taking the buffer and marking their bundles running
    flushing: AtomicUsize,
    timer: Mutex<Option<JoinHandle<()>>>,
    states: Mutex<FxHashMap<BundleId, BundleRunState>>,
    outcomes: mpsc::UnboundedSender<RebuildOutcome>,
    idle: Notify,
}

/// Cheap to clone; clones share one schedule.
#[derive(Clone)]
pub struct RebuildScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RebuildScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildScheduler")
            .field("bundles", &self.shared.bundles.len())
            .field("debounce", &self.shared.debounce)
            .finish_non_exhaustive()
    }
}

impl RebuildScheduler {
    /// Create a scheduler over `bundles`. Finished cycles are reported on the
    /// returned receiver; dropping it is fine.
    pub fn new(
        index: Arc<DependencyIndex>,
        bundles: impl IntoIterator<Item = (BundleId, SharedBundle)>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RebuildOutcome>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            index,
            bundles: bundles.into_iter().collect(),
            debounce,
            buffer: Mutex::new(IndexSet::new()),
            flushing: AtomicUsize::new(0),
            timer: Mutex::new(None),
            states: Mutex::new(FxHashMap::default()),
            outcomes,
            idle: Notify::new(),
        };
        (
            Self {
                shared: Arc::new(shared),
            },
            rx,
        )
    }

    /// Record a changed path and restart the debounce timer.
    pub fn on_change(&self, path: PathBuf) {
        self.shared.buffer.lock().insert(path);

        let this = self.clone();
        let debounce = self.shared.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            this.flush();
        });

        if let Some(previous) = self.shared.timer.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Turn the buffered changes into one batch and schedule every bundle it
    /// affects. Called by the debounce timer.
    pub fn flush(&self) {
        let (_flush, batch) = self.take_batch();
        if batch.is_empty() {
            return;
        }

        let mut affected: IndexSet<BundleId> = IndexSet::new();
        for path in &batch {
            affected.extend(self.shared.index.lookup(path));
        }

        if affected.is_empty() {
            tracing::debug!(paths = batch.len(), "change batch affects no bundle");
            return;
        }

        tracing::debug!(
            paths = batch.len(),
            bundles = affected.len(),
            "scheduling rebuilds"
        );
        for id in affected {
            self.schedule(id, batch.clone());
        }
    }

    /// Empty the buffer. The scheduler is not idle until the returned guard
    /// drops, so a batch is never invisible to [`wait_idle`](Self::wait_idle).
    fn take_batch(&self) -> (FlushGuard<'_>, Vec<PathBuf>) {
        let mut buffer = self.shared.buffer.lock();
        self.shared.flushing.fetch_add(1, Ordering::AcqRel);
        let batch = std::mem::take(&mut *buffer).into_iter().collect();
        (FlushGuard { scheduler: self }, batch)
    }

    /// Start a chain for `id`, or park `paths` if one is already running.
    fn schedule(&self, id: BundleId, paths: Vec<PathBuf>) {
        let Some(bundle) = self.shared.bundles.get(&id).cloned() else {
            tracing::warn!(bundle = %id, "index refers to an unknown bundle");
            return;
        };

        let paths = {
            let mut states = self.shared.states.lock();
            let state = states.entry(id).or_default();
            if state.running {
                tracing::debug!(bundle = %id, paths = paths.len(), "bundle busy, coalescing");
                state.pending.extend(paths);
                return;
            }
            state.running = true;
            // paths left over from a failed cycle go first
            let mut merged: IndexSet<PathBuf> = std::mem::take(&mut state.pending);
            merged.extend(paths);
            merged.into_iter().collect::<Vec<_>>()
        };

        let this = self.clone();
        tokio::spawn(async move { this.run_chain(id, bundle, paths).await });
    }

    async fn run_chain(self, id: BundleId, bundle: SharedBundle, mut paths: Vec<PathBuf>) {
        loop {
            let result = self.run_cycle(id, &bundle, &paths).await;
            let failed = result.is_err();
            let _ = self.shared.outcomes.send(RebuildOutcome {
                bundle: id,
                paths: paths.clone(),
                result,
            });

            let next = {
                let mut states = self.shared.states.lock();
                let state = states.entry(id).or_default();
                if failed {
                    let arrived_meanwhile = !state.pending.is_empty();
                    let mut retained: IndexSet<PathBuf> = paths.drain(..).collect();
                    retained.extend(state.pending.drain(..));
                    if arrived_meanwhile {
                        Some(retained.into_iter().collect())
                    } else {
                        state.pending = retained;
                        state.running = false;
                        None
                    }
                } else if state.pending.is_empty() {
                    state.running = false;
                    None
                } else {
                    Some(state.pending.drain(..).collect::<Vec<_>>())
                }
            };

            match next {
                Some(pending) => {
                    tracing::debug!(bundle = %id, paths = pending.len(), "follow-up cycle");
                    paths = pending;
                }
                None => break,
            }
        }

        self.notify_if_idle();
    }

    async fn run_cycle(
        &self,
        id: BundleId,
        bundle: &SharedBundle,
        paths: &[PathBuf],
    ) -> Result<(), BundleError> {
        let mut bundle = bundle.lock().await;
        tracing::info!(bundle = %id, input = %bundle.input_label(), changed = paths.len(), "rebuilding");

        let result = async {
            bundle.build(paths).await?;
            bundle.write().await
        }
        .await;

        // files keep their last successful set on failure, so this is a no-op then
        self.shared.index.update(&bundle);

        if let Err(err) = &result {
            tracing::warn!(bundle = %id, error = %err, "rebuild failed");
        }
        result
    }

    fn is_idle(&self) -> bool {
        let buffer = self.shared.buffer.lock();
        buffer.is_empty()
            && self.shared.flushing.load(Ordering::Acquire) == 0
            && !self.shared.states.lock().values().any(|s| s.running)
    }

    fn notify_if_idle(&self) {
        if self.is_idle() {
            self.shared.idle.notify_waiters();
        }
    }

    /// Resolve once nothing is buffered and no chain is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_running(&self, id: BundleId) -> bool {
        self.shared
            .states
            .lock()
            .get(&id)
            .is_some_and(|s| s.running)
    }

    /// Invalidations parked for `id`: queued behind a running cycle, or kept
    /// from a failed one.
    pub fn pending(&self, id: BundleId) -> Vec<PathBuf> {
        self.shared
            .states
            .lock()
            .get(&id)
            .map(|s| s.pending.iter().cloned().collect())
            .unwrap_or_default()
    }
}

struct FlushGuard<'a> {
    scheduler: &'a RebuildScheduler,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.shared.flushing.fetch_sub(1, Ordering::AcqRel);
        self.scheduler.notify_if_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use strata_bundler::testing::{StubBundler, StubControl};
    use strata_bundler::{BaseOptions, Bundle, BundleConfig, BundlerKind, EventSender, ScriptOptions};

    const ROOT: &str = "/virtual/project";

    fn path(rel: &str) -> PathBuf {
        Path::new(ROOT).join(rel)
    }

    async fn stub_bundle(files: &[&str]) -> (BundleId, SharedBundle, StubControl) {
        let stub = StubBundler::new(BundlerKind::Script).with_files(files.iter().map(|f| path(f)));
        let control = stub.control();
        let mut bundle = Bundle::with_engine(Box::new(stub), EventSender::noop());
        bundle
            .setup(BundleConfig::Script(ScriptOptions::new(
                BaseOptions::file(files[0], "dist/out.js").with_root(ROOT),
            )))
            .unwrap();
        bundle.build(&[]).await.unwrap();
        let id = bundle.id();
        (id, Arc::new(tokio::sync::Mutex::new(bundle)), control)
    }

    async fn scheduler(
        bundles: &[(BundleId, SharedBundle)],
    ) -> (RebuildScheduler, mpsc::UnboundedReceiver<RebuildOutcome>) {
        let index = Arc::new(DependencyIndex::new());
        for (_, bundle) in bundles {
            index.update(&*bundle.lock().await);
        }
        RebuildScheduler::new(index, bundles.iter().cloned(), Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_rebuilds_only_dependents() {
        let (a, bundle_a, control_a) = stub_bundle(&["src/a.js", "src/util.js"]).await;
        let (b, bundle_b, control_b) = stub_bundle(&["src/b.css"]).await;
        let (scheduler, _rx) = scheduler(&[(a, bundle_a), (b, bundle_b)]).await;

        scheduler.on_change(path("src/util.js"));
        scheduler.wait_idle().await;
        assert_eq!(control_a.builds(), 2);
        assert_eq!(control_b.builds(), 1);

        scheduler.on_change(path("src/unrelated.txt"));
        scheduler.wait_idle().await;
        assert_eq!(control_a.builds(), 2);
        assert_eq!(control_b.builds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_idle_while_batch_is_being_dispatched() {
        let (a, bundle_a, _control) = stub_bundle(&["src/a.js"]).await;
        let (scheduler, _rx) = scheduler(&[(a, bundle_a)]).await;

        scheduler.shared.buffer.lock().insert(path("src/a.js"));
        let (flush, batch) = scheduler.take_batch();
        assert_eq!(batch, vec![path("src/a.js")]);
        assert!(!scheduler.is_idle());

        let waited = tokio::time::timeout(Duration::from_secs(5), scheduler.wait_idle()).await;
        assert!(waited.is_err());

        scheduler.schedule(a, batch);
        drop(flush);
        assert!(!scheduler.is_idle());
        scheduler.wait_idle().await;
        assert!(!scheduler.is_running(a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_is_one_cycle() {
        let (a, bundle_a, control) = stub_bundle(&["src/a.js", "src/util.js"]).await;
        let (scheduler, _rx) = scheduler(&[(a, bundle_a)]).await;

        for _ in 0..3 {
            scheduler.on_change(path("src/util.js"));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        scheduler.wait_idle().await;

        assert_eq!(control.builds(), 2);
        assert_eq!(control.invalidations()[1], vec![path("src/util.js")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_during_build_coalesce_into_one_follow_up() {
        let (a, bundle_a, control) = stub_bundle(&["src/a.js", "src/util.js"]).await;
        control.set_delay(Duration::from_secs(1));
        let (scheduler, _rx) = scheduler(&[(a, bundle_a)]).await;

        scheduler.on_change(path("src/util.js"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(scheduler.is_running(a));

        scheduler.on_change(path("src/a.js"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.on_change(path("src/a.js"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(scheduler.pending(a), vec![path("src/a.js")]);

        scheduler.wait_idle().await;
        assert_eq!(control.builds(), 3);
        assert_eq!(control.max_concurrent(), 1);
        assert_eq!(control.invalidations()[2], vec![path("src/a.js")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_dependency_rebuilds_bundles_concurrently() {
        let (a, bundle_a, control_a) = stub_bundle(&["src/a.css", "src/theme.css"]).await;
        let (b, bundle_b, control_b) = stub_bundle(&["src/b.css", "src/theme.css"]).await;
        control_a.set_delay(Duration::from_secs(1));
        control_b.set_delay(Duration::from_secs(1));
        let (scheduler, _rx) = scheduler(&[(a, bundle_a), (b, bundle_b)]).await;

        let started = tokio::time::Instant::now();
        scheduler.on_change(path("src/theme.css"));
        scheduler.wait_idle().await;

        assert_eq!(control_a.builds(), 2);
        assert_eq!(control_b.builds(), 2);
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_keeps_paths_and_recovers() {
        let (a, bundle_a, control) = stub_bundle(&["src/a.js", "src/util.js"]).await;
        let (scheduler, mut rx) = scheduler(&[(a, bundle_a.clone())]).await;

        control.set_failing(true);
        scheduler.on_change(path("src/util.js"));
        scheduler.wait_idle().await;

        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.bundle, a);
        assert!(outcome.result.is_err());
        assert!(!scheduler.is_running(a));
        assert_eq!(scheduler.pending(a), vec![path("src/util.js")]);

        control.set_failing(false);
        scheduler.on_change(path("src/a.js"));
        scheduler.wait_idle().await;

        let outcome = rx.recv().await.unwrap();
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.paths, vec![path("src/util.js"), path("src/a.js")]);
        assert!(scheduler.pending(a).is_empty());
        assert_eq!(control.builds(), 3);
        assert!(bundle_a.lock().await.files().contains(&path("src/util.js")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_with_changes_in_flight_retries_once() {
        let (a, bundle_a, control) = stub_bundle(&["src/a.js", "src/util.js"]).await;
        control.set_failing(true);
        control.set_delay(Duration::from_secs(1));
        let (scheduler, mut rx) = scheduler(&[(a, bundle_a)]).await;

        scheduler.on_change(path("src/util.js"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.on_change(path("src/a.js"));

        let first = rx.recv().await.unwrap();
        assert!(first.result.is_err());
        control.set_failing(false);

        scheduler.wait_idle().await;
        let second = rx.recv().await.unwrap();
        assert!(second.result.is_ok());
        assert_eq!(control.builds(), 3);
        assert_eq!(
            control.invalidations()[2],
            vec![path("src/util.js"), path("src/a.js")]
        );
        assert!(scheduler.pending(a).is_empty());
    }
}
