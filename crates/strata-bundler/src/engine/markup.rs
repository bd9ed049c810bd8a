//! Markup engine: copies HTML documents and the local assets they reference.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use indexmap::IndexSet;
use path_clean::PathClean;
use regex::Regex;

use super::resolve::{normalize, SCRIPT_EXTENSIONS};
use super::{display_path, mismatch, output_dir, Bundler, SourceCache};
use crate::config::{BundleConfig, BundlerKind, MarkupOptions};
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:src|href)\s*=\s*["']([^"'#?]+)[^"']*["']"#)
        .expect("reference pattern is valid")
});

#[derive(Debug, Default)]
pub struct MarkupEngine {
    cache: SourceCache,
}

#[async_trait]
impl Bundler for MarkupEngine {
    fn kind(&self) -> BundlerKind {
        BundlerKind::Markup
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let BundleConfig::Markup(options) = config else {
            return Err(mismatch(self.kind(), config));
        };
        self.cache.invalidate(invalidated);
        let result = self.assemble(config, options).await;
        self.cache.settle(&result);
        result
    }
}

impl MarkupEngine {
    async fn assemble(
        &mut self,
        config: &BundleConfig,
        options: &MarkupOptions,
    ) -> Result<BuildOutput> {
        let base = &options.base;
        let out_dir = output_dir(config)?;
        let root = normalize(&base.root);

        let mut output = BuildOutput::default();
        let mut assets: IndexSet<(PathBuf, PathBuf)> = IndexSet::new();

        for input in base.input_files() {
            let document = normalize(&base.resolve(input));
            let html = self.cache.read(&document).await?;
            let doc_dir = document.parent().unwrap_or(&root).to_path_buf();
            output.files.insert(document.clone());

            for caps in REFERENCE_RE.captures_iter(&html) {
                let reference = &caps[1];
                if is_external(reference) {
                    continue;
                }
                let source = if let Some(stripped) = reference.strip_prefix('/') {
                    root.join(stripped)
                } else {
                    doc_dir.join(reference)
                };
                if !source.is_file() {
                    output.warnings.push(format!(
                        "{}: '{reference}' does not exist",
                        display_path(&root, &document)
                    ));
                    continue;
                }
                let source = normalize(&source);
                let target = out_dir.join(relative_target(&doc_dir, &source));
                if is_sub_bundle(&source) {
                    output.children.push(display_path(&root, &source));
                }
                output.files.insert(source.clone());
                assets.insert((source, target));
            }

            let name = document.file_name().map(PathBuf::from).unwrap_or_default();
            output
                .outputs
                .push(OutputFile::new(out_dir.join(name), html.as_bytes()));
        }

        for (source, target) in assets {
            let bytes = tokio::fs::read(&source)
                .await
                .map_err(|e| BundleError::Read {
                    path: source.clone(),
                    source: e,
                })?;
            output.outputs.push(OutputFile::new(target, bytes));
        }

        Ok(output)
    }
}

fn is_external(reference: &str) -> bool {
    reference.contains("://")
        || reference.starts_with("//")
        || reference.starts_with("data:")
        || reference.starts_with("mailto:")
        || reference.starts_with("javascript:")
}

fn is_sub_bundle(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext == "css" || ext == "scss" || SCRIPT_EXTENSIONS.contains(&ext))
}

/// Where an asset lands relative to the output directory. Assets outside the
/// document's directory keep only their file name.
fn relative_target(doc_dir: &Path, source: &Path) -> PathBuf {
    match source.strip_prefix(doc_dir) {
        Ok(relative) if !relative.components().any(|c| c == Component::ParentDir) => {
            relative.clean()
        }
        _ => source.file_name().map(PathBuf::from).unwrap_or_default(),
    }
}
