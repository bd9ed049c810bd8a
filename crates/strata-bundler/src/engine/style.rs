//! Style engine: `@import`/`@use`/`@forward` inlining.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use indexmap::IndexSet;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::resolve::{normalize, resolve_style};
use super::{display_path, mismatch, source_map, Bundler, SourceCache};
use crate::config::{BundleConfig, BundlerKind, InputSource, StyleOptions};
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

static AT_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*@(?:import|use|forward)\s+(?:url\(\s*)?["']([^"']+)["']\s*\)?[^;\n]*;[ \t]*\r?\n?"#)
        .expect("at-import pattern is valid")
});

/// A resolved import statement inside one sheet.
struct Link {
    span: Range<usize>,
    target: PathBuf,
}

#[derive(Debug, Default)]
pub struct StyleEngine {
    cache: SourceCache,
}

#[async_trait]
impl Bundler for StyleEngine {
    fn kind(&self) -> BundlerKind {
        BundlerKind::Style
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let BundleConfig::Style(options) = config else {
            return Err(mismatch(self.kind(), config));
        };
        self.cache.invalidate(invalidated);
        let result = self.assemble(options).await;
        self.cache.settle(&result);
        result
    }
}

impl StyleEngine {
    async fn assemble(&mut self, options: &StyleOptions) -> Result<BuildOutput> {
        let base = &options.base;
        let output_path = base.resolve(base.output.as_deref().ok_or(BundleError::NotSetUp)?);
        let root = normalize(&base.root);
        let include_paths: Vec<PathBuf> = options
            .include_paths
            .iter()
            .map(|p| normalize(&base.resolve(p)))
            .collect();

        let mut files: IndexSet<PathBuf> = IndexSet::new();
        let mut sheets: FxHashMap<PathBuf, (Arc<str>, Vec<Link>)> = FxHashMap::default();
        let mut inline_sheets = Vec::new();
        let mut queue = VecDeque::new();

        for input in &base.input {
            match input {
                InputSource::File(path) => {
                    let path = normalize(&base.resolve(path));
                    if files.insert(path.clone()) {
                        queue.push_back(path);
                    }
                }
                InputSource::Inline { code, root: inline_root } => {
                    let importer = base.resolve(inline_root).join("<inline>");
                    let links = scan(code, &importer, &include_paths)?;
                    for link in &links {
                        if files.insert(link.target.clone()) {
                            queue.push_back(link.target.clone());
                        }
                    }
                    inline_sheets.push((Arc::<str>::from(code.as_str()), links));
                }
            }
        }

        while let Some(path) = queue.pop_front() {
            let source = self.cache.read(&path).await?;
            let links = scan(&source, &path, &include_paths)?;
            for link in &links {
                if files.insert(link.target.clone()) {
                    queue.push_back(link.target.clone());
                }
            }
            sheets.insert(path, (source, links));
        }

        let mut css = String::new();
        let mut inlined = FxHashSet::default();
        let mut inline_iter = inline_sheets.iter();
        for input in &base.input {
            match input {
                InputSource::File(path) => {
                    let path = normalize(&base.resolve(path));
                    inline_sheet(&path, &sheets, &root, options, &mut inlined, &mut css);
                }
                InputSource::Inline { .. } => {
                    if let Some((code, links)) = inline_iter.next() {
                        splice(code, links, &sheets, &root, options, &mut inlined, &mut css);
                    }
                }
            }
        }

        let mut outputs = Vec::new();
        if base.map {
            let sources: Vec<PathBuf> = files.iter().cloned().collect();
            let map = source_map(&output_path, &root, &sources)?;
            let map_name = map
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(css, "/*# sourceMappingURL={map_name} */");
            outputs.push(OutputFile::new(output_path, css));
            outputs.push(map);
        } else {
            outputs.push(OutputFile::new(output_path, css));
        }

        Ok(BuildOutput {
            files,
            outputs,
            warnings: Vec::new(),
            children: Vec::new(),
        })
    }
}

/// Local imports of one sheet. Remote URLs and `sass:` modules stay as written.
fn scan(source: &str, importer: &Path, include_paths: &[PathBuf]) -> Result<Vec<Link>> {
    let Some(dir) = importer.parent() else {
        return Ok(Vec::new());
    };
    let mut dirs = vec![dir.to_path_buf()];
    dirs.extend(include_paths.iter().cloned());

    let mut links = Vec::new();
    for caps in AT_IMPORT_RE.captures_iter(source) {
        let specifier = &caps[1];
        if is_external(specifier) {
            continue;
        }
        let target = resolve_style(&dirs, specifier).ok_or_else(|| BundleError::Unresolved {
            specifier: specifier.to_string(),
            importer: importer.to_path_buf(),
        })?;
        let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
        links.push(Link { span, target });
    }
    Ok(links)
}

fn is_external(specifier: &str) -> bool {
    specifier.contains("://") || specifier.starts_with("//") || specifier.starts_with("sass:")
}

fn inline_sheet(
    path: &Path,
    sheets: &FxHashMap<PathBuf, (Arc<str>, Vec<Link>)>,
    root: &Path,
    options: &StyleOptions,
    inlined: &mut FxHashSet<PathBuf>,
    out: &mut String,
) {
    if !inlined.insert(path.to_path_buf()) {
        return;
    }
    let Some((source, links)) = sheets.get(path) else {
        return;
    };
    if !options.base.production {
        let _ = writeln!(out, "/* {} */", display_path(root, path));
    }
    splice(source, links, sheets, root, options, inlined, out);
}

/// Copy `source` into `out`, replacing each import statement with the imported sheet.
fn splice(
    source: &str,
    links: &[Link],
    sheets: &FxHashMap<PathBuf, (Arc<str>, Vec<Link>)>,
    root: &Path,
    options: &StyleOptions,
    inlined: &mut FxHashSet<PathBuf>,
    out: &mut String,
) {
    let mut cursor = 0;
    for link in links {
        push_text(out, &source[cursor..link.span.start], options.base.production);
        inline_sheet(&link.target, sheets, root, options, inlined, out);
        cursor = link.span.end;
    }
    push_text(out, &source[cursor..], options.base.production);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_text(out: &mut String, text: &str, production: bool) {
    if production {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
    } else {
        out.push_str(text);
    }
}
