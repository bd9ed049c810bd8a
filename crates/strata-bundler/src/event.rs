//! Bundle lifecycle events.
//!
//! Bundles never render anything themselves. They push [`BundleEvent`] values
//! into an [`EventSender`] and whoever holds the receiving end decides how to
//! display them.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::output::AnalysisReport;

static NEXT_BUNDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a bundle for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleId(u64);

impl BundleId {
    pub fn next() -> Self {
        Self(NEXT_BUNDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum BundleEvent {
    BuildStart {
        input: String,
        inline_code: Option<String>,
        child: Option<String>,
    },
    BuildEnd {
        input: String,
        inline_code: Option<String>,
        child: Option<String>,
    },
    BundleEnd,
    WriteStart {
        child: Option<String>,
    },
    WriteProgress {
        output_file: String,
    },
    WriteEnd {
        child: Option<String>,
    },
    /// Rendered error message; the typed error goes back to the caller.
    Error {
        error: String,
    },
    Warn {
        message: String,
    },
    Analysis {
        report: AnalysisReport,
    },
}

impl BundleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BundleEvent::BuildStart { .. } => "BUILD_START",
            BundleEvent::BuildEnd { .. } => "BUILD_END",
            BundleEvent::BundleEnd => "BUNDLE_END",
            BundleEvent::WriteStart { .. } => "WRITE_START",
            BundleEvent::WriteProgress { .. } => "WRITE_PROGRESS",
            BundleEvent::WriteEnd { .. } => "WRITE_END",
            BundleEvent::Error { .. } => "ERROR",
            BundleEvent::Warn { .. } => "WARN",
            BundleEvent::Analysis { .. } => "ANALYSIS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub bundle: BundleId,
    pub event: BundleEvent,
}

/// Sending half of the lifecycle event channel.
///
/// A sender created with [`EventSender::noop`] silently drops everything.
/// Sending to a closed channel is not an error either: losing the reporter
/// must never fail a build.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<EventEnvelope>>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn noop() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, bundle: BundleId, event: BundleEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(EventEnvelope { bundle, event }).is_err() {
                tracing::trace!(%bundle, "event receiver dropped");
            }
        }
    }
}
