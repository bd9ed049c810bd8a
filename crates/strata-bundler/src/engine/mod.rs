//! The bundler contract and the built-in engines.
//!
//! Engines only discover dependencies and assemble files. They keep a
//! [`SourceCache`] of the last successful build's files between builds, so an
//! incremental build re-reads just the invalidated paths while the assembled
//! output stays identical to what a full build would produce.

mod icon;
mod manifest;
mod markup;
pub(crate) mod resolve;
mod script;
mod style;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::config::{BundleConfig, BundlerKind};
use crate::error::{BundleError, Result};
use crate::output::BuildOutput;

pub use icon::IconEngine;
pub use manifest::ManifestEngine;
pub use markup::MarkupEngine;
pub use resolve::normalize;
pub use script::ScriptEngine;
pub use style::StyleEngine;

/// One bundler implementation behind the uniform [`crate::Bundle`] surface.
#[async_trait]
pub trait Bundler: Send {
    fn kind(&self) -> BundlerKind;

    /// Build from `config`.
    ///
    /// `invalidated` is a hint: an empty slice asks for a full build, otherwise
    /// the engine may reuse work for every path not listed. Either way the
    /// returned output must match a full build.
    async fn build(&mut self, config: &BundleConfig, invalidated: &[PathBuf])
        -> Result<BuildOutput>;
}

/// Built-in engine for `kind`.
pub fn engine_for(kind: BundlerKind) -> Box<dyn Bundler> {
    match kind {
        BundlerKind::Script => Box::new(ScriptEngine::default()),
        BundlerKind::Style => Box::new(StyleEngine::default()),
        BundlerKind::Markup => Box::new(MarkupEngine::default()),
        BundlerKind::Manifest => Box::new(ManifestEngine::default()),
        BundlerKind::Icon => Box::new(IconEngine),
    }
}

pub(crate) fn mismatch(engine: BundlerKind, config: &BundleConfig) -> BundleError {
    BundleError::Build {
        input: config
            .base()
            .input
            .first()
            .map(|i| i.describe())
            .unwrap_or_default(),
        message: format!("the {engine} engine cannot build a {} bundle", config.kind()),
    }
}

/// `path` relative to `root` with forward slashes, for labels and source maps.
pub(crate) fn display_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Output directory for kinds whose `output` names a directory.
pub(crate) fn output_dir(config: &BundleConfig) -> Result<PathBuf> {
    let base = config.base();
    let output = base.output.as_deref().ok_or(BundleError::NotSetUp)?;
    Ok(base.resolve(output))
}

/// Sources-only v3 map written next to `output`.
pub(crate) fn source_map(
    output: &Path,
    root: &Path,
    sources: &[PathBuf],
) -> Result<crate::output::OutputFile> {
    let mut map_path = output.as_os_str().to_owned();
    map_path.push(".map");
    let map_path = PathBuf::from(map_path);

    let file = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map = serde_json::json!({
        "version": 3,
        "file": file,
        "sourceRoot": "",
        "sources": sources.iter().map(|s| display_path(root, s)).collect::<Vec<_>>(),
        "names": [],
        "mappings": "",
    });
    let contents = serde_json::to_vec(&map).map_err(|source| BundleError::Json {
        path: map_path.clone(),
        source,
    })?;

    Ok(crate::output::OutputFile::new(map_path, contents))
}

/// Text sources read during previous builds.
#[derive(Debug, Default)]
pub(crate) struct SourceCache {
    entries: FxHashMap<PathBuf, Arc<str>>,
}

impl SourceCache {
    /// Drop stale entries before a build. An empty list clears everything.
    pub(crate) fn invalidate(&mut self, invalidated: &[PathBuf]) {
        if invalidated.is_empty() {
            self.entries.clear();
            return;
        }
        for path in invalidated {
            let key = resolve::normalize(path);
            if self.entries.remove(&key).is_some() {
                tracing::trace!(path = %key.display(), "source cache entry invalidated");
            }
        }
    }

    /// Keep only the entries the finished build depends on. A failed build
    /// keeps nothing, since it may have read files outside any reported set.
    pub(crate) fn settle(&mut self, result: &Result<BuildOutput>) {
        match result {
            Ok(output) => self.entries.retain(|path, _| output.files.contains(path)),
            Err(_) => self.entries.clear(),
        }
    }

    pub(crate) async fn read(&mut self, path: &Path) -> Result<Arc<str>> {
        if let Some(source) = self.entries.get(path) {
            return Ok(Arc::clone(source));
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| BundleError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let text: Arc<str> = Arc::from(text);
        self.entries.insert(path.to_path_buf(), Arc::clone(&text));
        Ok(text)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
