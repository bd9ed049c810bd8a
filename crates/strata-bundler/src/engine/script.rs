//! Script engine: relative module graph walk and dependency-ordered concatenation.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use indexmap::IndexSet;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::resolve::{is_relative_specifier, normalize, resolve_script};
use super::{display_path, mismatch, source_map, Bundler, SourceCache};
use crate::config::{BundleConfig, BundlerKind, Format, InputSource, JsxOptions, ScriptOptions};
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

/// Every specifier position the engine follows: static imports, re-exports,
/// dynamic `import()` and `require()`.
static SPECIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:^\s*import\s+(?:[\w*${}\s,]+\s+from\s+)?|^\s*export\s+(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+|\bimport\s*\(\s*|\brequire\s*\(\s*)["']([^"']+)["']"#,
    )
    .expect("specifier pattern is valid")
});

/// Whole-statement static imports and re-exports of relative modules. These
/// are dropped from the output since the module body is inlined ahead of them.
static STATIC_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*(?:import\s+(?:[\w*${}\s,]+\s+from\s+)?|export\s+(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+)["']\.{1,2}/[^"']*["'][ \t]*;?[ \t]*\r?\n?"#,
    )
    .expect("static link pattern is valid")
});

static DEBUGGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdebugger\s*;?").expect("debugger pattern is valid"));

enum Root {
    File(PathBuf),
    Inline { code: String, deps: Vec<PathBuf> },
}

enum Chunk<'a> {
    Module(PathBuf),
    Inline(&'a str),
}

#[derive(Debug, Default)]
pub struct ScriptEngine {
    cache: SourceCache,
}

#[async_trait]
impl Bundler for ScriptEngine {
    fn kind(&self) -> BundlerKind {
        BundlerKind::Script
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let BundleConfig::Script(options) = config else {
            return Err(mismatch(self.kind(), config));
        };
        self.cache.invalidate(invalidated);
        let result = self.assemble(options).await;
        self.cache.settle(&result);
        result
    }
}

impl ScriptEngine {
    async fn assemble(&mut self, options: &ScriptOptions) -> Result<BuildOutput> {
        let base = &options.base;
        let output_path = base.resolve(base.output.as_deref().ok_or(BundleError::NotSetUp)?);
        let root = normalize(&base.root);

        let mut files: IndexSet<PathBuf> = IndexSet::new();
        let mut graph: FxHashMap<PathBuf, Vec<PathBuf>> = FxHashMap::default();
        let mut queue = VecDeque::new();
        let mut roots = Vec::new();

        for input in &base.input {
            match input {
                InputSource::File(path) => {
                    let path = normalize(&base.resolve(path));
                    if files.insert(path.clone()) {
                        queue.push_back(path.clone());
                    }
                    roots.push(Root::File(path));
                }
                InputSource::Inline { code, root: inline_root } => {
                    let importer = base.resolve(inline_root).join("<inline>");
                    let deps = scan(code, &importer)?;
                    for dep in &deps {
                        if files.insert(dep.clone()) {
                            queue.push_back(dep.clone());
                        }
                    }
                    roots.push(Root::Inline {
                        code: code.clone(),
                        deps,
                    });
                }
            }
        }

        while let Some(path) = queue.pop_front() {
            let source = self.cache.read(&path).await?;
            let deps = scan(&source, &path)?;
            for dep in &deps {
                if files.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
            graph.insert(path, deps);
        }

        let mut seen = FxHashSet::default();
        let mut chunks = Vec::new();
        for entry in &roots {
            match entry {
                Root::File(path) => post_order(path, &graph, &mut seen, &mut chunks),
                Root::Inline { code, deps } => {
                    for dep in deps {
                        post_order(dep, &graph, &mut seen, &mut chunks);
                    }
                    chunks.push(Chunk::Inline(code.as_str()));
                }
            }
        }

        let mut warnings = Vec::new();
        let mut sources = Vec::new();
        let mut code = String::new();
        code.push_str(header(options));

        for chunk in &chunks {
            match chunk {
                Chunk::Module(path) => {
                    let source = self.cache.read(path).await?;
                    let label = display_path(&root, path);
                    if base.lint && DEBUGGER_RE.is_match(&source) {
                        warnings.push(format!("{label}: debugger statement left in source"));
                    }
                    if !base.production {
                        let _ = writeln!(code, "// {label}");
                    }
                    if is_jsx(path) {
                        code.push_str(&jsx_pragma(&options.jsx));
                    }
                    push_body(&mut code, &STATIC_LINK_RE.replace_all(&source, ""), base.production);
                    sources.push(path.clone());
                }
                Chunk::Inline(inline) => {
                    if !base.production {
                        code.push_str("// <inline>\n");
                    }
                    push_body(&mut code, &STATIC_LINK_RE.replace_all(inline, ""), base.production);
                }
            }
        }

        code.push_str(footer(options.format));

        let mut outputs = Vec::new();
        if base.map {
            let map = source_map(&output_path, &root, &sources)?;
            let map_name = map
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = writeln!(code, "//# sourceMappingURL={map_name}");
            outputs.push(OutputFile::new(output_path, code));
            outputs.push(map);
        } else {
            outputs.push(OutputFile::new(output_path, code));
        }

        tracing::debug!(
            modules = chunks.len(),
            files = files.len(),
            "script graph assembled"
        );

        Ok(BuildOutput {
            files,
            outputs,
            warnings,
            children: Vec::new(),
        })
    }
}

/// Resolved relative dependencies of one module, in source order.
fn scan(source: &str, importer: &Path) -> Result<Vec<PathBuf>> {
    let mut deps = Vec::new();
    for caps in SPECIFIER_RE.captures_iter(source) {
        let specifier = &caps[1];
        if !is_relative_specifier(specifier) {
            continue;
        }
        let resolved =
            resolve_script(importer, specifier).ok_or_else(|| BundleError::Unresolved {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            })?;
        if !deps.contains(&resolved) {
            deps.push(resolved);
        }
    }
    Ok(deps)
}

fn post_order<'a>(
    path: &Path,
    graph: &FxHashMap<PathBuf, Vec<PathBuf>>,
    seen: &mut FxHashSet<PathBuf>,
    out: &mut Vec<Chunk<'a>>,
) {
    if !seen.insert(path.to_path_buf()) {
        return;
    }
    if let Some(deps) = graph.get(path) {
        for dep in deps {
            post_order(dep, graph, seen, out);
        }
    }
    out.push(Chunk::Module(path.to_path_buf()));
}

fn header(options: &ScriptOptions) -> &'static str {
    match options.format {
        Format::Esm => "",
        Format::Cjs => "'use strict';\n",
        Format::Iife => "(function () {\n",
    }
}

fn footer(format: Format) -> &'static str {
    match format {
        Format::Iife => "})();\n",
        Format::Esm | Format::Cjs => "",
    }
}

fn is_jsx(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsx" | "tsx")
    )
}

fn jsx_pragma(jsx: &JsxOptions) -> String {
    let mut pragma = String::new();
    if let Some(source) = &jsx.import_source {
        let _ = writeln!(pragma, "/** @jsxImportSource {source} */");
    }
    if let Some(factory) = &jsx.factory {
        let _ = writeln!(pragma, "/** @jsx {factory} */");
    }
    if let Some(fragment) = &jsx.fragment {
        let _ = writeln!(pragma, "/** @jsxFrag {fragment} */");
    }
    pragma
}

fn push_body(code: &mut String, body: &str, production: bool) {
    if production {
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            code.push_str(line);
            code.push('\n');
        }
    } else {
        code.push_str(body);
        if !body.ends_with('\n') {
            code.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseOptions, InputSource};
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = normalize(dir.path());
        fs::create_dir_all(root.join("src")).unwrap();
        (dir, root)
    }

    fn config(root: &Path, input: &str, production: bool) -> BundleConfig {
        let mut base = BaseOptions::file(input, "dist/out.js").with_root(root);
        base.map = false;
        base.production = production;
        BundleConfig::Script(ScriptOptions::new(base))
    }

    fn text(output: &BuildOutput) -> String {
        String::from_utf8(output.outputs[0].contents.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_dependencies_come_first() {
        let (_dir, root) = project();
        fs::write(
            root.join("src/a.js"),
            "import { twice } from './util';\nconsole.log(twice(2));\n",
        )
        .unwrap();
        fs::write(
            root.join("src/util.js"),
            "export function twice(n) { return n * 2; }\n",
        )
        .unwrap();

        let mut engine = ScriptEngine::default();
        let output = engine
            .build(&config(&root, "src/a.js", false), &[])
            .await
            .unwrap();

        let files: Vec<_> = output.files.iter().cloned().collect();
        assert_eq!(files, vec![root.join("src/a.js"), root.join("src/util.js")]);

        let code = text(&output);
        let util_at = code.find("function twice").unwrap();
        let main_at = code.find("console.log").unwrap();
        assert!(util_at < main_at);
        assert!(!code.contains("from './util'"));
        assert!(code.contains("// src/util.js"));
    }

    #[tokio::test]
    async fn test_unresolved_relative_import() {
        let (_dir, root) = project();
        fs::write(root.join("src/a.js"), "import './gone.js';\n").unwrap();

        let err = ScriptEngine::default()
            .build(&config(&root, "src/a.js", false), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Unresolved { ref specifier, .. } if specifier == "./gone.js"));
    }

    #[tokio::test]
    async fn test_bare_imports_are_left_alone() {
        let (_dir, root) = project();
        fs::write(root.join("src/a.js"), "import React from 'react';\n").unwrap();

        let output = ScriptEngine::default()
            .build(&config(&root, "src/a.js", false), &[])
            .await
            .unwrap();
        assert_eq!(output.files.len(), 1);
        assert!(text(&output).contains("import React from 'react';"));
    }

    #[tokio::test]
    async fn test_cycles_are_emitted_once() {
        let (_dir, root) = project();
        fs::write(root.join("src/a.js"), "import './b.js';\nconst a = 1;\n").unwrap();
        fs::write(root.join("src/b.js"), "import './a.js';\nconst b = 2;\n").unwrap();

        let output = ScriptEngine::default()
            .build(&config(&root, "src/a.js", false), &[])
            .await
            .unwrap();
        let code = text(&output);
        assert_eq!(code.matches("const a").count(), 1);
        assert_eq!(code.matches("const b").count(), 1);
        assert!(code.find("const b").unwrap() < code.find("const a").unwrap());
    }

    #[tokio::test]
    async fn test_incremental_matches_full_build() {
        let (_dir, root) = project();
        let util = root.join("src/util.js");
        fs::write(root.join("src/a.js"), "require('./util');\nmain();\n").unwrap();
        fs::write(&util, "function helper() {}\n").unwrap();

        let config = config(&root, "src/a.js", false);
        let mut engine = ScriptEngine::default();
        engine.build(&config, &[]).await.unwrap();

        fs::write(&util, "function helper() { return 42; }\n").unwrap();
        let incremental = engine.build(&config, &[util.clone()]).await.unwrap();
        let full = ScriptEngine::default().build(&config, &[]).await.unwrap();

        assert_eq!(incremental.outputs, full.outputs);
        assert!(text(&incremental).contains("return 42"));
    }

    #[tokio::test]
    async fn test_dropped_then_reimported_dependency_is_reread() {
        let (_dir, root) = project();
        let a = root.join("src/a.js");
        let util = root.join("src/util.js");
        fs::write(&a, "import './util.js';\nuse(v);\n").unwrap();
        fs::write(&util, "const v = 'OLD';\n").unwrap();

        let config = config(&root, "src/a.js", false);
        let mut engine = ScriptEngine::default();
        engine.build(&config, &[]).await.unwrap();

        fs::write(&a, "use(1);\n").unwrap();
        let output = engine.build(&config, &[a.clone()]).await.unwrap();
        assert!(!output.files.contains(&util));

        // util is no longer watched by this bundle, so its edit arrives with no hint
        fs::write(&util, "const v = 'NEW';\n").unwrap();
        fs::write(&a, "import './util.js';\nuse(v);\n").unwrap();
        let incremental = engine.build(&config, &[a.clone()]).await.unwrap();
        let full = ScriptEngine::default().build(&config, &[]).await.unwrap();

        assert_eq!(incremental.outputs, full.outputs);
        assert!(text(&incremental).contains("const v = 'NEW';"));
    }

    #[tokio::test]
    async fn test_recovers_after_new_import_failed() {
        let (_dir, root) = project();
        let a = root.join("src/a.js");
        let b = root.join("src/b.js");
        fs::write(&a, "main();\n").unwrap();

        let config = config(&root, "src/a.js", false);
        let mut engine = ScriptEngine::default();
        engine.build(&config, &[]).await.unwrap();

        fs::write(&b, "import './missing.js';\n").unwrap();
        fs::write(&a, "import './b.js';\nmain();\n").unwrap();
        let err = engine.build(&config, &[a.clone()]).await.unwrap_err();
        assert!(matches!(err, BundleError::Unresolved { .. }));

        fs::write(&b, "const b = 1;\n").unwrap();
        fs::write(&a, "import './b.js';\nmain(b);\n").unwrap();
        let incremental = engine.build(&config, &[a.clone()]).await.unwrap();
        let full = ScriptEngine::default().build(&config, &[]).await.unwrap();

        assert_eq!(incremental.outputs, full.outputs);
        assert!(text(&incremental).contains("const b = 1;"));
    }

    #[tokio::test]
    async fn test_formats_and_production() {
        let (_dir, root) = project();
        fs::write(root.join("src/a.js"), "\n\nrun();\n\n").unwrap();

        let BundleConfig::Script(options) = config(&root, "src/a.js", true) else {
            unreachable!()
        };
        let iife = BundleConfig::Script(options.clone().format(Format::Iife));
        let code = text(&ScriptEngine::default().build(&iife, &[]).await.unwrap());
        assert_eq!(code, "(function () {\nrun();\n})();\n");

        let cjs = BundleConfig::Script(options.format(Format::Cjs));
        let code = text(&ScriptEngine::default().build(&cjs, &[]).await.unwrap());
        assert!(code.starts_with("'use strict';\n"));
    }

    #[tokio::test]
    async fn test_source_map_and_lint() {
        let (_dir, root) = project();
        fs::write(root.join("src/a.js"), "debugger;\n").unwrap();

        let mut base = BaseOptions::file("src/a.js", "dist/out.js").with_root(&root);
        base.map = true;
        let config = BundleConfig::Script(ScriptOptions::new(base));
        let output = ScriptEngine::default().build(&config, &[]).await.unwrap();

        assert_eq!(output.outputs.len(), 2);
        assert!(text(&output).ends_with("//# sourceMappingURL=out.js.map\n"));
        assert_eq!(output.outputs[1].path, root.join("dist/out.js.map"));
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("debugger"));
    }

    #[tokio::test]
    async fn test_inline_input_and_jsx_pragma() {
        let (_dir, root) = project();
        fs::write(root.join("src/view.jsx"), "export const v = <div />;\n").unwrap();

        let mut base = BaseOptions {
            input: vec![InputSource::Inline {
                code: "import './view.jsx';\nrender(v);\n".to_string(),
                root: root.join("src"),
            }],
            output: Some(PathBuf::from("dist/out.js")),
            ..BaseOptions::default()
        }
        .with_root(&root);
        base.map = false;
        let mut options = ScriptOptions::new(base);
        options.jsx.factory = Some("h".to_string());

        let output = ScriptEngine::default()
            .build(&BundleConfig::Script(options), &[])
            .await
            .unwrap();
        let code = text(&output);
        assert!(code.contains("/** @jsx h */\nexport const v"));
        assert!(code.ends_with("render(v);\n"));
        assert_eq!(output.files.len(), 1);
    }
}
