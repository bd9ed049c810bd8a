//! Command implementations for the Strata CLI.
//!
//! - [`build`] - one-shot builds, watch mode and `--serve`
//! - [`plan`] - turns resolved targets into bundle configurations
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and returns a Result.

use std::sync::Arc;

use strata_bundler::Bundle;

pub mod build;
pub mod plan;
pub(crate) mod utils;

pub use build::execute as build_execute;

/// A bundle shared between the initial build and the rebuild scheduler.
///
/// The async mutex serializes every build and write of one bundle.
pub type SharedBundle = Arc<tokio::sync::Mutex<Bundle>>;
