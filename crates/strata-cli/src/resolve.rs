//! Entry resolution: CLI arguments to an ordered list of build targets.
//!
//! Each argument is tried, in order, as
//!
//! 1. an exact workspace name,
//! 2. a path or glob relative to the project root,
//! 3. a glob over workspace names (`@acme/*`).
//!
//! With no arguments every workspace is built, or the root package when
//! the root isn't a monorepo.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_bundler::BundlerKind;

use crate::error::{CliError, ResolutionError, Result};
use crate::project::{self, Project, PACKAGE_JSON};

/// What a single file argument builds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    Style,
    Markup,
    Manifest,
    Icon,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if file_name == "manifest.json" {
            return Some(FileKind::Manifest);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Some(FileKind::Script),
            "css" | "scss" | "sass" => Some(FileKind::Style),
            "html" | "htm" => Some(FileKind::Markup),
            "webmanifest" => Some(FileKind::Manifest),
            "png" | "ico" | "svg" => Some(FileKind::Icon),
            _ => None,
        }
    }

    pub fn bundler_kind(self) -> BundlerKind {
        match self {
            FileKind::Script => BundlerKind::Script,
            FileKind::Style => BundlerKind::Style,
            FileKind::Markup => BundlerKind::Markup,
            FileKind::Manifest => BundlerKind::Manifest,
            FileKind::Icon => BundlerKind::Icon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Buildable `package.json` fields, as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub lib: Option<String>,
    pub module: Option<String>,
    pub main: Option<String>,
    pub browser: Option<String>,
    pub style: Option<String>,
}

impl EntryFields {
    fn from_project(project: &Project) -> Self {
        let manifest = project.manifest();
        Self {
            lib: manifest.lib.clone(),
            module: manifest.module.clone(),
            main: manifest.main.clone(),
            browser: manifest.browser_path().map(str::to_string),
            style: manifest.style.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lib.is_none()
            && self.module.is_none()
            && self.main.is_none()
            && self.browser.is_none()
            && self.style.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTarget {
    pub name: String,
    pub root: PathBuf,
    pub fields: EntryFields,
    /// Pulled in by `--link` rather than named on the command line
    pub linked: bool,
}

impl PackageTarget {
    fn from_project(project: &Project) -> Self {
        Self {
            name: project.name(),
            root: project.root().to_path_buf(),
            fields: EntryFields::from_project(project),
            linked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    File(FileTarget),
    Package(PackageTarget),
}

impl BuildTarget {
    /// Identity used for de-duplication.
    pub fn key(&self) -> &Path {
        match self {
            BuildTarget::File(file) => &file.path,
            BuildTarget::Package(pkg) => &pkg.root,
        }
    }

    pub fn label(&self) -> String {
        match self {
            BuildTarget::File(file) => file.path.display().to_string(),
            BuildTarget::Package(pkg) => pkg.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// `--link`: `None` when absent, an empty list to link everything.
    pub link: Option<Vec<String>>,
    pub recursive: bool,
    /// `--output` was given, so packages without entry fields are still buildable.
    pub has_output_override: bool,
}

#[derive(Debug)]
pub struct EntryResolver {
    root: PathBuf,
    project: Option<Project>,
    /// Workspaces of the monorepo enclosing `root`, used for name lookups.
    workspaces: Vec<Project>,
}

impl EntryResolver {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = dunce::canonicalize(root).map_err(|_| CliError::FileNotFound(root.to_path_buf()))?;
        let project = Project::try_load(&root)?;
        let workspaces = match project::find_monorepo(&root)? {
            Some(mono) => mono.workspaces()?,
            None => Vec::new(),
        };

        Ok(Self {
            root,
            project,
            workspaces,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `patterns` into de-duplicated targets, linked packages first.
    pub fn resolve(&self, patterns: &[String], opts: &ResolveOptions) -> Result<Vec<BuildTarget>> {
        let mut targets: IndexMap<PathBuf, BuildTarget> = IndexMap::new();

        if patterns.is_empty() {
            for target in self.default_targets() {
                targets.entry(target.key().to_path_buf()).or_insert(target);
            }
        } else {
            for pattern in patterns {
                for target in self.resolve_pattern(pattern)? {
                    targets.entry(target.key().to_path_buf()).or_insert(target);
                }
            }
        }

        if targets.is_empty() {
            let patterns = if patterns.is_empty() {
                vec![self.root.display().to_string()]
            } else {
                patterns.to_vec()
            };
            return Err(ResolutionError::NoTargets { patterns }.into());
        }

        if opts.recursive {
            targets = self.expand_recursive(targets)?;
        }

        if let Some(filters) = &opts.link {
            targets = self.prepend_linked(targets, filters)?;
        }

        let targets: Vec<BuildTarget> = targets.into_values().collect();
        if !opts.has_output_override {
            for target in &targets {
                if let BuildTarget::Package(pkg) = target {
                    if pkg.fields.is_empty() {
                        return Err(ResolutionError::NoBuildableField {
                            name: pkg.name.clone(),
                            root: pkg.root.clone(),
                        }
                        .into());
                    }
                }
            }
        }

        tracing::debug!(count = targets.len(), "resolved build targets");
        Ok(targets)
    }

    fn default_targets(&self) -> Vec<BuildTarget> {
        match &self.project {
            Some(project) if project.is_monorepo() => self
                .workspaces
                .iter()
                .filter(|ws| ws.root().starts_with(&self.root))
                .map(|ws| BuildTarget::Package(PackageTarget::from_project(ws)))
                .collect(),
            Some(project) => vec![BuildTarget::Package(PackageTarget::from_project(project))],
            None => Vec::new(),
        }
    }

    fn resolve_pattern(&self, pattern: &str) -> Result<Vec<BuildTarget>> {
        if let Some(ws) = self.workspaces.iter().find(|ws| ws.name() == pattern) {
            return Ok(vec![BuildTarget::Package(PackageTarget::from_project(ws))]);
        }

        let found = if is_glob(pattern) {
            self.glob_targets(pattern)?
        } else {
            self.literal_path(pattern)?
        };
        if !found.is_empty() {
            return Ok(found);
        }

        Ok(self
            .workspaces
            .iter()
            .filter(|ws| fast_glob::glob_match(pattern, ws.name().as_str()))
            .map(|ws| BuildTarget::Package(PackageTarget::from_project(ws)))
            .collect())
    }

    fn literal_path(&self, pattern: &str) -> Result<Vec<BuildTarget>> {
        let path = self.root.join(pattern);
        if path.is_file() {
            let kind = FileKind::from_path(&path)
                .ok_or_else(|| ResolutionError::UnsupportedFile(path.clone()))?;
            let path = dunce::canonicalize(&path)?;
            return Ok(vec![BuildTarget::File(FileTarget { path, kind })]);
        }
        if path.is_dir() && path.join(PACKAGE_JSON).is_file() {
            let project = Project::load(&path)?;
            return Ok(vec![BuildTarget::Package(PackageTarget::from_project(
                &project,
            ))]);
        }
        Ok(Vec::new())
    }

    /// Packages and supported files under the root matching `pattern`. A
    /// matched directory counts when it holds a `package.json`; unsupported
    /// files are skipped rather than rejected.
    fn glob_targets(&self, pattern: &str) -> Result<Vec<BuildTarget>> {
        let glob = project::normalize_glob(pattern);
        let matches = |path: &Path| {
            let relative = project::relative_slash(&self.root, path);
            !relative.is_empty() && fast_glob::glob_match(&glob, &relative)
        };

        let mut found = Vec::new();
        for dir in project::walk_dirs(&self.root).filter(|dir| matches(dir)) {
            if dir.join(PACKAGE_JSON).is_file() {
                let project = Project::load(&dir)?;
                found.push(BuildTarget::Package(PackageTarget::from_project(&project)));
            }
        }
        found.extend(
            project::walk_files(&self.root)
                .filter(|path| matches(path))
                .filter_map(|path| {
                    let kind = FileKind::from_path(&path)?;
                    Some(BuildTarget::File(FileTarget { path, kind }))
                }),
        );
        Ok(found)
    }

    /// Replace monorepo package targets with their workspaces.
    fn expand_recursive(
        &self,
        targets: IndexMap<PathBuf, BuildTarget>,
    ) -> Result<IndexMap<PathBuf, BuildTarget>> {
        let mut expanded = IndexMap::new();
        for (key, target) in targets {
            let nested = match &target {
                BuildTarget::Package(pkg) if pkg.root != self.root => {
                    let project = Project::load(&pkg.root)?;
                    if project.is_monorepo() {
                        project.workspaces()?
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            };

            if nested.is_empty() {
                expanded.entry(key).or_insert(target);
            } else {
                for ws in &nested {
                    let target = BuildTarget::Package(PackageTarget::from_project(ws));
                    expanded.entry(target.key().to_path_buf()).or_insert(target);
                }
            }
        }
        Ok(expanded)
    }

    /// Collect the linked-dependency closure of every package target, keep
    /// the packages matching `filters` and put them in front in dependency order.
    fn prepend_linked(
        &self,
        targets: IndexMap<PathBuf, BuildTarget>,
        filters: &[String],
    ) -> Result<IndexMap<PathBuf, BuildTarget>> {
        let by_name: FxHashMap<String, &Project> =
            self.workspaces.iter().map(|ws| (ws.name(), ws)).collect();

        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
        let mut queue: VecDeque<Project> = VecDeque::new();
        for target in targets.values() {
            if let BuildTarget::Package(pkg) = target {
                if seen.insert(pkg.root.clone()) {
                    queue.push_back(Project::load(&pkg.root)?);
                }
            }
        }

        let mut linked: IndexMap<PathBuf, Project> = IndexMap::new();
        let mut edges: Vec<(PathBuf, PathBuf)> = Vec::new();

        while let Some(project) = queue.pop_front() {
            for dep in self.linked_dependencies(&project, &by_name)? {
                edges.push((dep.root().to_path_buf(), project.root().to_path_buf()));
                if seen.insert(dep.root().to_path_buf()) {
                    queue.push_back(dep.clone());
                }
                if matches_link_filter(&dep.name(), filters) && !targets.contains_key(dep.root()) {
                    linked.entry(dep.root().to_path_buf()).or_insert(dep);
                }
            }
        }

        if linked.is_empty() {
            return Ok(targets);
        }

        let order = topo_order(&linked, &edges)?;
        let mut result = IndexMap::new();
        for root in order {
            if let Some(project) = linked.get(&root) {
                let target = BuildTarget::Package(PackageTarget {
                    linked: true,
                    ..PackageTarget::from_project(project)
                });
                result.insert(root, target);
            }
        }
        tracing::debug!(count = result.len(), "linked packages added");
        result.extend(targets);
        Ok(result)
    }

    /// Local packages `project` depends on: workspace names among its
    /// dependencies plus `link:`/`file:` paths.
    fn linked_dependencies(
        &self,
        project: &Project,
        by_name: &FxHashMap<String, &Project>,
    ) -> Result<Vec<Project>> {
        let mut deps: IndexMap<PathBuf, Project> = IndexMap::new();

        for name in project.dependency_names() {
            if let Some(ws) = by_name.get(name) {
                if ws.root() != project.root() {
                    deps.entry(ws.root().to_path_buf()).or_insert_with(|| (*ws).clone());
                }
            }
        }

        for (name, path) in project.local_dependencies() {
            let dep = match path {
                Some(path) if path.join(PACKAGE_JSON).is_file() => Project::load(&path)?,
                _ => match by_name.get(&name) {
                    Some(ws) => (*ws).clone(),
                    None => {
                        tracing::warn!(package = %project.name(), dependency = %name, "linked dependency not found");
                        continue;
                    }
                },
            };
            deps.entry(dep.root().to_path_buf()).or_insert(dep);
        }

        Ok(deps.into_values().collect())
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn matches_link_filter(name: &str, filters: &[String]) -> bool {
    filters.is_empty()
        || filters
            .iter()
            .any(|f| f == name || fast_glob::glob_match(f, name))
}

/// Order `linked` so dependencies come before their dependents.
fn topo_order(
    linked: &IndexMap<PathBuf, Project>,
    edges: &[(PathBuf, PathBuf)],
) -> Result<Vec<PathBuf>> {
    let mut graph: DiGraph<PathBuf, ()> = DiGraph::new();
    let nodes: FxHashMap<&PathBuf, NodeIndex> = linked
        .keys()
        .map(|root| (root, graph.add_node(root.clone())))
        .collect();

    for (from, to) in edges {
        if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
            if !graph.contains_edge(a, b) {
                graph.add_edge(a, b, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| graph[n].clone()).collect()),
        Err(cycle) => {
            let names = |n: NodeIndex| linked.get(&graph[n]).map(Project::name).unwrap_or_default();
            let mut packages: Vec<String> = kosaraju_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&cycle.node_id()))
                .unwrap_or_else(|| vec![cycle.node_id()])
                .into_iter()
                .map(names)
                .collect();
            if let Some(first) = packages.first().cloned() {
                packages.push(first);
            }
            Err(ResolutionError::LinkCycle { packages }.into())
        }
    }
}
