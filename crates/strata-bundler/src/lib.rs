//! # strata-bundler
//!
//! Bundle configuration, the uniform bundler contract and the built-in engines
//! used by the `strata` CLI.
//!
//! A [`Bundle`] wraps one engine invocation. It is configured once with a
//! [`BundleConfig`], built any number of times (optionally with a list of
//! invalidated paths as a hint), and written to disk from the last successful
//! build. Every step is reported as a [`BundleEvent`] on an [`EventSender`].
//!
//! ```no_run
//! use strata_bundler::{BaseOptions, Bundle, BundleConfig, EventSender, ScriptOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (events, _rx) = EventSender::channel();
//! let config = BundleConfig::Script(ScriptOptions::new(
//!     BaseOptions::file("src/index.js", "dist/index.js"),
//! ));
//!
//! let mut bundle = Bundle::new(config.kind(), events);
//! bundle.setup(config)?;
//! bundle.build(&[]).await?;
//! bundle.write().await?;
//!
//! for file in bundle.files() {
//!     println!("depends on {}", file.display());
//! }
//! # Ok(()) }
//! ```

pub mod bundle;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod output;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bundle::{Bundle, BundleStatus};
pub use config::{
    BaseOptions, BundleConfig, BundlerKind, Format, IconOptions, InputSource, JsxOptions,
    ManifestOptions, ManifestOverrides, MarkupOptions, Platform, ScriptOptions, StyleOptions,
};
pub use engine::{engine_for, normalize, Bundler};
pub use error::{BundleError, ConfigError, Result};
pub use event::{BundleEvent, BundleId, EventEnvelope, EventSender};
pub use output::{AnalysisReport, BuildOutput, OutputFile, OutputStat};
