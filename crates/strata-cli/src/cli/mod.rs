//! Command-line interface definition.
//!
//! - `strata build [TARGET]...` builds files, packages or workspaces once, or
//!   keeps rebuilding them with `--watch` / `--serve`.

mod commands;
pub mod enums;
mod tests;
mod validation;

use clap::Parser;

pub use commands::{BuildArgs, Command};
pub use enums::*;
pub use validation::{parse_debounce, parse_jsx_name};

/// Strata - build scripts, styles, pages and manifests from one command
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Build scripts, styles, pages and manifests from one command",
    long_about = "Strata resolves files, packages and monorepo workspaces into bundles,\n\
                  builds them, and in watch mode rebuilds only the bundles whose\n\
                  tracked dependencies changed."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
