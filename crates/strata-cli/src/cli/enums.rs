use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format for script bundles
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// ECMAScript modules (import/export syntax)
    #[value(name = "esm")]
    Esm,

    /// CommonJS modules, prefixed with 'use strict'
    #[value(name = "cjs")]
    Cjs,

    /// Immediately Invoked Function Expression for plain script tags
    #[value(name = "iife")]
    Iife,
}

impl From<Format> for strata_bundler::Format {
    fn from(format: Format) -> Self {
        match format {
            Format::Esm => strata_bundler::Format::Esm,
            Format::Cjs => strata_bundler::Format::Cjs,
            Format::Iife => strata_bundler::Format::Iife,
        }
    }
}
