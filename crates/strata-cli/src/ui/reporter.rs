//! Progress reporter: the only consumer of bundle lifecycle events.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use strata_bundler::{AnalysisReport, BundleEvent, BundleId, EventEnvelope};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{format_duration, format_size, messages};

/// Counts collected over a reporter's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ReporterSummary {
    /// Bundles that finished writing
    pub built: usize,
    /// `ERROR` events seen
    pub failed: usize,
    pub warnings: usize,
    /// `(label, bytes, build time)` per finished write
    pub rows: Vec<(String, u64, Duration)>,
}

#[derive(Debug)]
struct InFlight {
    started: Instant,
    report: Option<AnalysisReport>,
}

/// Renders lifecycle events as status lines.
#[derive(Debug, Default)]
pub struct Reporter {
    labels: FxHashMap<BundleId, String>,
    in_flight: FxHashMap<BundleId, InFlight>,
    summary: ReporterSummary,
}

/// Running reporter task.
#[derive(Debug)]
pub struct ReporterHandle {
    done: Option<oneshot::Sender<()>>,
    task: JoinHandle<ReporterSummary>,
}

impl ReporterHandle {
    /// Drain events already queued, stop the task and return its summary.
    pub async fn finish(mut self) -> ReporterSummary {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        self.task.await.unwrap_or_default()
    }
}

impl Reporter {
    pub fn new(labels: impl IntoIterator<Item = (BundleId, String)>) -> Self {
        Self {
            labels: labels.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn summary(&self) -> &ReporterSummary {
        &self.summary
    }

    fn label(&self, id: BundleId) -> String {
        self.labels
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("bundle {id}"))
    }

    pub fn handle(&mut self, envelope: EventEnvelope) {
        let EventEnvelope { bundle, event } = envelope;
        match event {
            BundleEvent::BuildStart {
                input, child: None, ..
            } => {
                tracing::debug!(%bundle, %input, "build started");
                self.in_flight.insert(
                    bundle,
                    InFlight {
                        started: Instant::now(),
                        report: None,
                    },
                );
            }
            BundleEvent::BuildStart {
                child: Some(child), ..
            } => {
                tracing::debug!(%bundle, %child, "child bundle discovered");
            }
            BundleEvent::BuildEnd { child: None, .. } => {
                if let Some(flight) = self.in_flight.get(&bundle) {
                    tracing::debug!(%bundle, elapsed = ?flight.started.elapsed(), "build ended");
                }
            }
            BundleEvent::BuildEnd { child: Some(_), .. } | BundleEvent::BundleEnd => {}
            BundleEvent::Analysis { report } => {
                if let Some(flight) = self.in_flight.get_mut(&bundle) {
                    flight.report = Some(report);
                }
            }
            BundleEvent::WriteStart { .. } => {
                tracing::trace!(%bundle, "write started");
            }
            BundleEvent::WriteProgress { output_file } => {
                tracing::debug!(%bundle, file = %output_file, "wrote");
            }
            BundleEvent::WriteEnd { child: Some(_) } => {}
            BundleEvent::WriteEnd { child: None } => {
                let label = self.label(bundle);
                let (elapsed, bytes) = match self.in_flight.remove(&bundle) {
                    Some(flight) => (
                        flight.started.elapsed(),
                        flight.report.map(|r| r.total_bytes()).unwrap_or(0),
                    ),
                    None => (Duration::ZERO, 0),
                };
                messages::success(&format!(
                    "Built {label} ({}) in {}",
                    format_size(bytes),
                    format_duration(elapsed)
                ));
                self.summary.built += 1;
                self.summary.rows.push((label, bytes, elapsed));
            }
            BundleEvent::Warn { message } => {
                self.summary.warnings += 1;
                messages::warning(&format!("{}: {message}", self.label(bundle)));
            }
            BundleEvent::Error { error } => {
                self.summary.failed += 1;
                self.in_flight.remove(&bundle);
                messages::error(&format!("{}: {error}", self.label(bundle)));
            }
        }
    }

    /// Consume `rx` on a background task until the channel closes or the
    /// handle is finished.
    pub fn spawn(mut self, mut rx: mpsc::UnboundedReceiver<EventEnvelope>) -> ReporterHandle {
        let (done, mut done_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    envelope = rx.recv() => match envelope {
                        Some(envelope) => self.handle(envelope),
                        None => break,
                    },
                    _ = &mut done_rx => {
                        while let Ok(envelope) = rx.try_recv() {
                            self.handle(envelope);
                        }
                        break;
                    }
                }
            }
            self.summary
        });

        ReporterHandle {
            done: Some(done),
            task,
        }
    }
}
