//! Strata CLI - build orchestration and incremental watch/rebuild.
//!
//! # Architecture
//!
//! - [`project`] - `package.json` model and workspace discovery
//! - [`resolve`] - turns CLI arguments into build targets
//! - [`commands`] - the `build` command, bundle planning and one-shot builds
//! - [`watch`] - dependency index, change watcher and rebuild scheduler
//! - [`server`] - static file server for `--serve`
//! - [`config`] - layered configuration (defaults, `strata.json`, env, flags)
//! - [`error`] - error types with actionable hints
//! - [`logger`] / [`ui`] - tracing setup and terminal output
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_cli::resolve::{EntryResolver, ResolveOptions};
//!
//! let resolver = EntryResolver::new("/path/to/monorepo")?;
//! let targets = resolver.resolve(&["@acme/*".to_string()], &ResolveOptions::default())?;
//! println!("{} targets", targets.len());
//! # Ok::<(), strata_cli::CliError>(())
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod project;
pub mod resolve;
pub mod server;
pub mod ui;
pub mod watch;

pub use error::{BuildError, CliError, ResolutionError, Result, ResultExt};
