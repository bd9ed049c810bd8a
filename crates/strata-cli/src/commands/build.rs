//! Build command implementation.
//!
//! `strata build` resolves targets, plans and constructs one bundle per
//! output, builds them once and exits, or keeps watching with `--watch`
//! and `--serve`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use strata_bundler::{Bundle, BundleError, BundleId, EventSender};
use tokio::task::JoinSet;

use crate::cli::BuildArgs;
use crate::commands::plan::{self, PlannedBundle};
use crate::commands::{utils, SharedBundle};
use crate::config::BuildConfig;
use crate::error::{BuildError, CliError, ConfigError, Result};
use crate::resolve::{BuildTarget, EntryResolver, ResolveOptions};
use crate::server::StaticServer;
use crate::ui::{self, Reporter, Spinner};
use crate::watch::{self, WatchSession};

/// A constructed bundle with its label and initial build stage.
#[derive(Debug, Clone)]
pub struct StagedBundle {
    pub id: BundleId,
    pub label: String,
    pub stage: usize,
    pub bundle: SharedBundle,
}

/// Outcome of building every bundle once.
#[derive(Debug, Default)]
pub struct BuildResults {
    pub total: usize,
    pub failures: Vec<(BundleId, BundleError)>,
}

impl BuildResults {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn failures into the command's error.
    pub fn into_result(mut self) -> Result<()> {
        match self.failures.len() {
            0 => Ok(()),
            1 if self.total == 1 => match self.failures.pop() {
                Some((_, err)) => Err(BuildError::Bundle(err).into()),
                None => Ok(()),
            },
            failed => Err(BuildError::Failed {
                failed,
                total: self.total,
            }
            .into()),
        }
    }
}

/// Execute the build command.
///
/// # Build Process
///
/// 1. Resolve the project root and load configuration
/// 2. Resolve entries into targets (linked packages first)
/// 3. Plan and construct bundles; one bad config skips only its bundle
/// 4. Build and write every bundle, stage by stage
/// 5. Exit, or keep watching and rebuilding until Ctrl+C
///
/// Returns the bundles so callers can inspect their final state.
pub async fn execute(args: BuildArgs) -> Result<Vec<SharedBundle>> {
    let start_time = Instant::now();

    let root = utils::resolve_project_root(args.cwd.as_deref(), !args.entries.is_empty())?;
    let root = dunce::canonicalize(&root).unwrap_or(root);
    let config = BuildConfig::load(&args, &root)?;

    let spinner = Spinner::new("Resolving build targets...");
    let targets = match resolve_targets(&args.entries, &config, &root) {
        Ok(targets) => {
            spinner.finish(&format!("Resolved {} target(s)", targets.len()));
            targets
        }
        Err(err) => {
            spinner.fail("Could not resolve build targets");
            return Err(err);
        }
    };

    let (events, events_rx) = EventSender::channel();
    let planned = plan::plan(&targets, &config, &root);
    plan::check_outputs(&planned)?;
    let staged = construct(planned, &events)?;
    let reporter = Reporter::new(
        staged
            .iter()
            .map(|s| (s.id, s.label.clone())),
    )
    .spawn(events_rx);

    if !args.watching() {
        let results = build_all(&staged).await;
        let summary = reporter.finish().await;
        if summary.rows.len() > 1 {
            ui::print_build_summary(&summary.rows);
        }
        results.into_result()?;

        ui::success(&format!(
            "Build completed in {}",
            ui::format_duration(start_time.elapsed())
        ));
        return Ok(staged.into_iter().map(|s| s.bundle).collect());
    }

    let watch_root = watch::watch_root(&root, targets.iter().map(BuildTarget::key));
    let session = WatchSession::attach(&watch_root, &config.watch_ignore)?;

    let results = build_all(&staged).await;
    if results.is_success() {
        ui::success(&format!(
            "Initial build completed in {}",
            ui::format_duration(start_time.elapsed())
        ));
    } else {
        ui::warning(&format!(
            "{} of {} bundles failed; they rebuild when their files change",
            results.failures.len(),
            results.total
        ));
    }

    let bundles: Vec<SharedBundle> = staged.into_iter().map(|s| s.bundle).collect();
    let active = session.start(&bundles, config.debounce()).await;
    ui::info(&format!("Watching for changes in {}", active.root().display()));

    let server = if args.serve {
        let dir = serve_dir(&bundles, &root).await;
        Some(StaticServer::bind(dir, config.port).await?)
    } else {
        None
    };

    ui::info("Press Ctrl+C to stop");
    let outcome = match server {
        Some(server) => {
            tokio::select! {
                served = server.run() => served,
                signal = tokio::signal::ctrl_c() => signal.map_err(CliError::Io),
            }
        }
        None => tokio::signal::ctrl_c().await.map_err(CliError::Io),
    };

    ui::info("Stopping watch...");
    active.shutdown().await;
    reporter.finish().await;
    outcome?;

    ui::success("Watch stopped");
    Ok(bundles)
}

fn resolve_targets(entries: &[String], config: &BuildConfig, root: &Path) -> Result<Vec<BuildTarget>> {
    let resolver = EntryResolver::new(root)?;
    let opts = ResolveOptions {
        link: config.link.clone(),
        recursive: config.recursive,
        has_output_override: config.output.is_some(),
    };
    resolver.resolve(entries, &opts)
}

/// Construct and set up every planned bundle. Bundles whose configuration
/// is rejected are reported and skipped; if none survive the command fails.
pub fn construct(planned: Vec<PlannedBundle>, events: &EventSender) -> Result<Vec<StagedBundle>> {
    let total = planned.len();
    let mut staged = Vec::with_capacity(total);
    let mut rejected: Vec<ConfigError> = Vec::new();

    for PlannedBundle {
        label,
        config,
        stage,
    } in planned
    {
        let mut bundle = Bundle::new(config.kind(), events.clone());
        match bundle.setup(config) {
            Ok(()) => staged.push(StagedBundle {
                id: bundle.id(),
                label,
                stage,
                bundle: Arc::new(tokio::sync::Mutex::new(bundle)),
            }),
            Err(err) => {
                let err = ConfigError::from(err);
                ui::error(&format!("{label}: {err}"));
                rejected.push(err);
            }
        }
    }

    if staged.is_empty() {
        return match (rejected.pop(), total) {
            (Some(err), 1) => Err(err.into()),
            _ => Err(BuildError::NoBundles.into()),
        };
    }

    tracing::debug!(bundles = staged.len(), skipped = rejected.len(), "bundles constructed");
    Ok(staged)
}

/// Build and write every bundle once. Stages run in order; bundles of one
/// stage run concurrently. A failed stage does not stop later ones.
pub async fn build_all(staged: &[StagedBundle]) -> BuildResults {
    let mut stages: Vec<usize> = staged.iter().map(|s| s.stage).collect();
    stages.sort_unstable();
    stages.dedup();

    let mut results = BuildResults {
        total: staged.len(),
        failures: Vec::new(),
    };

    for stage in stages {
        let mut set = JoinSet::new();
        for entry in staged.iter().filter(|s| s.stage == stage) {
            let bundle = Arc::clone(&entry.bundle);
            set.spawn(async move {
                let mut bundle = bundle.lock().await;
                let id = bundle.id();
                let result = async {
                    bundle.build(&[]).await?;
                    bundle.write().await
                }
                .await;
                (id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(err))) => results.failures.push((id, err)),
                Err(err) => tracing::error!(error = %err, "build task panicked"),
            }
        }
    }

    results
}

/// Directory served by `--serve`: the first bundle's output directory.
async fn serve_dir(bundles: &[SharedBundle], root: &Path) -> PathBuf {
    let Some(first) = bundles.first() else {
        return root.join(plan::DEFAULT_OUT_DIR);
    };
    let output = first.lock().await.output();
    match output {
        Some(path) if path.is_dir() || path.extension().is_none() => path,
        Some(path) => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf()),
        None => root.join(plan::DEFAULT_OUT_DIR),
    }
}
