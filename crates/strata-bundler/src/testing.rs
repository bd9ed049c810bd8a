//! Scriptable engine for exercising orchestration code.
//!
//! Enabled with the `test-utils` feature.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexSet;

use crate::config::{BundleConfig, BundlerKind};
use crate::engine::Bundler;
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

#[derive(Debug, Default)]
struct StubState {
    builds: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    failing: AtomicBool,
    files: Mutex<IndexSet<PathBuf>>,
    invalidations: Mutex<Vec<Vec<PathBuf>>>,
    delay: Mutex<Option<Duration>>,
    write_output: AtomicBool,
}

/// Handle for steering and inspecting a [`StubBundler`] after it has been
/// moved into a bundle.
#[derive(Debug, Clone)]
pub struct StubControl {
    state: Arc<StubState>,
}

impl StubControl {
    /// Number of builds started so far.
    pub fn builds(&self) -> usize {
        self.state.builds.load(Ordering::SeqCst)
    }

    /// Highest number of builds that were in flight at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.state.delay) = Some(delay);
    }

    pub fn set_files<I, P>(&self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        *lock(&self.state.files) = files.into_iter().map(Into::into).collect();
    }

    /// The invalidation list passed to every build, in call order.
    pub fn invalidations(&self) -> Vec<Vec<PathBuf>> {
        lock(&self.state.invalidations).clone()
    }
}

/// Engine that reports a configurable dependency set without touching sources.
#[derive(Debug)]
pub struct StubBundler {
    kind: BundlerKind,
    state: Arc<StubState>,
}

impl StubBundler {
    pub fn new(kind: BundlerKind) -> Self {
        Self {
            kind,
            state: Arc::default(),
        }
    }

    pub fn with_files<I, P>(self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.control().set_files(files);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.control().set_delay(delay);
        self
    }

    /// Emit one output file (`build <n>`) at the configured output path.
    pub fn writing_output(self) -> Self {
        self.state.write_output.store(true, Ordering::SeqCst);
        self
    }

    pub fn control(&self) -> StubControl {
        StubControl {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Bundler for StubBundler {
    fn kind(&self) -> BundlerKind {
        self.kind
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let state = &self.state;
        let n = state.builds.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&state.invalidations).push(invalidated.to_vec());

        let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(active, Ordering::SeqCst);

        let delay = *lock(&state.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        state.active.fetch_sub(1, Ordering::SeqCst);

        if state.failing.load(Ordering::SeqCst) {
            return Err(BundleError::Build {
                input: config
                    .base()
                    .input
                    .first()
                    .map(|i| i.describe())
                    .unwrap_or_default(),
                message: format!("stub failure on build {n}"),
            });
        }

        let mut output = BuildOutput {
            files: lock(&state.files).clone(),
            ..BuildOutput::default()
        };
        if state.write_output.load(Ordering::SeqCst) {
            if let Some(out) = config.output() {
                output.outputs.push(OutputFile::new(
                    config.base().resolve(out),
                    format!("build {n}\n"),
                ));
            }
        }
        Ok(output)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
