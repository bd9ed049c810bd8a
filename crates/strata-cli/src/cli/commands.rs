use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::enums::*;
use crate::cli::validation::{parse_debounce, parse_jsx_name};

/// Available Strata subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build files, packages or workspaces
    ///
    /// With no targets, builds every workspace of the project (or the project
    /// itself when it is not a monorepo).
    Build(BuildArgs),
}

/// Arguments for the build command
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Files, directories or workspace names to build (globs allowed)
    ///
    /// Examples:
    ///   strata build src/index.js
    ///   strata build packages/ui
    ///   strata build '@acme/*'
    #[arg(value_name = "TARGET")]
    pub entries: Vec<String>,

    /// Output file or directory
    ///
    /// Overrides the output fields declared in package.json.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Rebuild affected bundles when their sources change
    #[arg(short, long)]
    pub watch: bool,

    /// Browserslist-style targets query passed to the engines
    #[arg(long, value_name = "QUERY")]
    pub targets: Option<String>,

    /// Script output format used with --output
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Production build (no path markers, compact output)
    #[arg(short, long)]
    pub production: bool,

    /// Do not emit source maps
    #[arg(long)]
    pub no_map: bool,

    /// Skip lint warnings
    #[arg(long)]
    pub no_lint: bool,

    /// Expand packages that are themselves monorepos into their workspaces
    #[arg(short, long)]
    pub recursive: bool,

    /// Also build linked local dependencies, filtered by name patterns
    ///
    /// Without patterns every linked dependency is included. Linked
    /// dependencies are built before the packages that use them.
    ///
    /// Examples:
    ///   strata build packages/app --link
    ///   strata build packages/app --link '@acme/*',utils
    #[arg(long, value_name = "PATTERNS", num_args = 0.., value_delimiter = ',')]
    pub link: Option<Vec<String>>,

    /// Serve the output directory over HTTP (implies --watch)
    #[arg(long)]
    pub serve: bool,

    /// Port for --serve
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Run as if started in this directory
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Config file to load instead of strata.json
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSX factory function (e.g. h, React.createElement)
    #[arg(long, value_name = "NAME", value_parser = parse_jsx_name)]
    pub jsx_factory: Option<String>,

    /// JSX fragment (e.g. Fragment, React.Fragment)
    #[arg(long, value_name = "NAME", value_parser = parse_jsx_name)]
    pub jsx_fragment: Option<String>,

    /// Module the JSX runtime is imported from (e.g. preact)
    #[arg(long, value_name = "MODULE")]
    pub jsx_import_source: Option<String>,

    /// Debounce window for file changes, in milliseconds
    #[arg(long, value_name = "MS", value_parser = parse_debounce)]
    pub debounce: Option<u64>,
}

impl BuildArgs {
    /// Watch mode is on for --watch and for --serve.
    pub fn watching(&self) -> bool {
        self.watch || self.serve
    }
}
