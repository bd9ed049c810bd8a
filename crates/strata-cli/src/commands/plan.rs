//! Turning resolved targets into bundle configurations.
//!
//! Packages contribute one script bundle per declared output field
//! (`module` → esm, `main` → cjs, `browser` → iife) built from `lib`, plus
//! a style bundle for `style`. Files contribute one bundle of their kind.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use strata_bundler::{
    BundleConfig, Format, IconOptions, ManifestOptions, ManifestOverrides, MarkupOptions,
    Platform, ScriptOptions, StyleOptions,
};

use crate::config::BuildConfig;
use crate::error::{ResolutionError, Result};
use crate::resolve::{BuildTarget, FileKind, FileTarget, PackageTarget};

/// Default output directory, relative to the target's root.
pub const DEFAULT_OUT_DIR: &str = "dist";

/// One bundle to construct, with a label for messages.
#[derive(Debug, Clone)]
pub struct PlannedBundle {
    pub label: String,
    pub config: BundleConfig,
    /// Initial builds run stage by stage; bundles within a stage run
    /// concurrently. Linked packages get one stage each, in dependency
    /// order, ahead of everything else.
    pub stage: usize,
}

/// Plan every bundle for `targets`. `root` is the project root that
/// relative `--output` paths and file targets are resolved against.
pub fn plan(targets: &[BuildTarget], config: &BuildConfig, root: &Path) -> Vec<PlannedBundle> {
    let output = config.output.as_ref().map(|o| absolute(o, root));
    let linked = targets
        .iter()
        .filter(|t| matches!(t, BuildTarget::Package(p) if p.linked))
        .count();
    let mut planned = Vec::new();

    for (position, target) in targets.iter().enumerate() {
        let (bundles, stage) = match target {
            BuildTarget::File(file) => (vec![plan_file(file, config, output.as_deref(), root)], linked),
            BuildTarget::Package(pkg) => (
                plan_package(pkg, config, output.as_deref()),
                if pkg.linked { position } else { linked },
            ),
        };
        planned.extend(bundles.into_iter().map(|b| PlannedBundle { stage, ..b }));
    }

    tracing::debug!(targets = targets.len(), bundles = planned.len(), "planned bundles");
    planned
}

/// Reject plans where two script or style bundles write the same file.
/// Markup, manifest and icon bundles write into a directory and may share it.
pub fn check_outputs(planned: &[PlannedBundle]) -> Result<()> {
    let mut seen: FxHashMap<&Path, &str> = FxHashMap::default();
    for bundle in planned {
        let writes_file = matches!(
            bundle.config,
            BundleConfig::Script(_) | BundleConfig::Style(_)
        );
        let Some(output) = bundle.config.output().filter(|_| writes_file) else {
            continue;
        };
        if let Some(first) = seen.insert(output, &bundle.label) {
            return Err(ResolutionError::AmbiguousOutput {
                path: output.to_path_buf(),
                first: first.to_string(),
                second: bundle.label.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn plan_file(
    file: &FileTarget,
    config: &BuildConfig,
    output: Option<&Path>,
    root: &Path,
) -> PlannedBundle {
    let stem = file_stem(&file.path);
    let out_dir = root.join(DEFAULT_OUT_DIR);
    let label = file
        .path
        .strip_prefix(root)
        .unwrap_or(&file.path)
        .display()
        .to_string();

    let bundle_config = match file.kind {
        FileKind::Script => {
            let out = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| out_dir.join(format!("{stem}.js")));
            BundleConfig::Script(script_options(
                config,
                file.path.clone(),
                Some(out),
                root,
                config.format.into(),
            ))
        }
        FileKind::Style => {
            let out = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| out_dir.join(format!("{stem}.css")));
            BundleConfig::Style(StyleOptions {
                base: config.base_options(file.path.clone(), Some(out), root),
                include_paths: Vec::new(),
            })
        }
        FileKind::Markup | FileKind::Manifest | FileKind::Icon => {
            let dir = output.map(Path::to_path_buf).unwrap_or(out_dir);
            let base = config.base_options(file.path.clone(), Some(dir), root);
            match file.kind {
                FileKind::Markup => BundleConfig::Markup(MarkupOptions { base }),
                FileKind::Manifest => BundleConfig::Manifest(ManifestOptions {
                    base,
                    overrides: ManifestOverrides::default(),
                }),
                _ => BundleConfig::Icon(IconOptions::new(base)),
            }
        }
    };

    PlannedBundle {
        label,
        config: bundle_config,
        stage: 0,
    }
}

fn plan_package(
    pkg: &PackageTarget,
    config: &BuildConfig,
    output: Option<&Path>,
) -> Vec<PlannedBundle> {
    let root = pkg.root.as_path();
    let fields = &pkg.fields;
    let mut planned = Vec::new();

    let script_outputs: Vec<(&str, &String, Format)> = [
        ("module", fields.module.as_ref(), Format::Esm),
        ("main", fields.main.as_ref(), Format::Cjs),
        ("browser", fields.browser.as_ref(), Format::Iife),
    ]
    .into_iter()
    .filter_map(|(field, path, format)| path.map(|p| (field, p, format)))
    .collect();

    let wants_script = fields.lib.is_some() || !script_outputs.is_empty();
    if wants_script {
        let input = fields.lib.as_ref().map(|lib| root.join(lib));
        let bundles: Vec<(String, Option<PathBuf>, Format)> = match output {
            Some(out) => {
                let format = Format::from(config.format);
                vec![(
                    format!("{} ({})", pkg.name, format.as_str()),
                    Some(out.to_path_buf()),
                    format,
                )]
            }
            None if script_outputs.is_empty() => {
                vec![(pkg.name.clone(), None, config.format.into())]
            }
            None => script_outputs
                .iter()
                .map(|(field, path, format)| {
                    (format!("{} ({field})", pkg.name), Some(root.join(path)), *format)
                })
                .collect(),
        };

        for (label, out, format) in bundles {
            let mut options = script_options(
                config,
                input.clone().unwrap_or_default(),
                out,
                root,
                format,
            );
            if input.is_none() {
                options.base.input.clear();
            }
            planned.push(PlannedBundle {
                label,
                config: BundleConfig::Script(options),
                stage: 0,
            });
        }
    }

    if let Some(style) = &fields.style {
        let input = root.join(style);
        let file_name = format!("{}.css", file_stem(&input));
        let out = match output {
            Some(out) if wants_script => out
                .parent()
                .map(|dir| dir.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
            Some(out) => out.to_path_buf(),
            None => root.join(DEFAULT_OUT_DIR).join(&file_name),
        };
        planned.push(PlannedBundle {
            label: format!("{} (style)", pkg.name),
            config: BundleConfig::Style(StyleOptions {
                base: config.base_options(input, Some(out), root),
                include_paths: vec![root.join("node_modules")],
            }),
            stage: 0,
        });
    }

    planned
}

fn script_options(
    config: &BuildConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    root: &Path,
    format: Format,
) -> ScriptOptions {
    let mut options = ScriptOptions::new(config.base_options(input, output, root)).format(format);
    options.jsx = config.jsx_options();
    if format == Format::Cjs {
        options.platform = Platform::Node;
    }
    options
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string())
}

fn absolute(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::EntryFields;
    use strata_bundler::BundlerKind;

    fn package(fields: EntryFields) -> BuildTarget {
        BuildTarget::Package(PackageTarget {
            name: "@acme/ui".to_string(),
            root: PathBuf::from("/repo/packages/ui"),
            fields,
            linked: false,
        })
    }

    fn outputs(planned: &[PlannedBundle]) -> Vec<PathBuf> {
        planned
            .iter()
            .map(|p| p.config.output().unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn test_one_script_bundle_per_output_field() {
        let target = package(EntryFields {
            lib: Some("src/index.ts".to_string()),
            module: Some("dist/index.mjs".to_string()),
            main: Some("dist/index.cjs".to_string()),
            style: Some("src/ui.scss".to_string()),
            ..EntryFields::default()
        });
        let planned = plan(&[target], &BuildConfig::default(), Path::new("/repo"));

        assert_eq!(planned.len(), 3);
        assert_eq!(
            outputs(&planned),
            vec![
                PathBuf::from("/repo/packages/ui/dist/index.mjs"),
                PathBuf::from("/repo/packages/ui/dist/index.cjs"),
                PathBuf::from("/repo/packages/ui/dist/ui.css"),
            ]
        );
        match &planned[1].config {
            BundleConfig::Script(o) => {
                assert_eq!(o.format, Format::Cjs);
                assert_eq!(o.platform, Platform::Node);
            }
            other => panic!("expected script bundle, got {:?}", other.kind()),
        }
        assert_eq!(planned[2].config.kind(), BundlerKind::Style);
    }

    #[test]
    fn test_output_override_collapses_script_bundles() {
        let target = package(EntryFields {
            lib: Some("src/index.ts".to_string()),
            module: Some("dist/index.mjs".to_string()),
            main: Some("dist/index.cjs".to_string()),
            style: Some("src/ui.css".to_string()),
            ..EntryFields::default()
        });
        let config = BuildConfig {
            output: Some(PathBuf::from("out/bundle.js")),
            ..BuildConfig::default()
        };
        let planned = plan(&[target], &config, Path::new("/repo"));
        assert_eq!(
            outputs(&planned),
            vec![
                PathBuf::from("/repo/out/bundle.js"),
                PathBuf::from("/repo/out/ui.css"),
            ]
        );
    }

    #[test]
    fn test_lib_without_outputs_fails_setup() {
        let target = package(EntryFields {
            lib: Some("src/index.ts".to_string()),
            ..EntryFields::default()
        });
        let planned = plan(&[target], &BuildConfig::default(), Path::new("/repo"));
        assert_eq!(planned.len(), 1);
        assert!(planned[0].config.validate().is_err());
    }

    #[test]
    fn test_output_field_without_lib_fails_setup() {
        let target = package(EntryFields {
            main: Some("dist/index.js".to_string()),
            ..EntryFields::default()
        });
        let planned = plan(&[target], &BuildConfig::default(), Path::new("/repo"));
        assert_eq!(planned.len(), 1);
        assert!(planned[0].config.base().input.is_empty());
        assert!(planned[0].config.validate().is_err());
    }

    #[test]
    fn test_linked_packages_get_their_own_stage() {
        let linked = |name: &str| {
            BuildTarget::Package(PackageTarget {
                name: name.to_string(),
                root: PathBuf::from(format!("/repo/packages/{name}")),
                fields: EntryFields {
                    lib: Some("src/index.js".to_string()),
                    module: Some("dist/index.mjs".to_string()),
                    ..EntryFields::default()
                },
                linked: true,
            })
        };
        let targets = [
            linked("utils"),
            linked("core"),
            package(EntryFields {
                lib: Some("src/index.js".to_string()),
                module: Some("dist/index.mjs".to_string()),
                style: Some("src/ui.css".to_string()),
                ..EntryFields::default()
            }),
        ];
        let planned = plan(&targets, &BuildConfig::default(), Path::new("/repo"));
        let stages: Vec<usize> = planned.iter().map(|p| p.stage).collect();
        assert_eq!(stages, vec![0, 1, 2, 2]);
    }

    #[test]
    fn test_shared_output_file_is_ambiguous() {
        let script = |path: &str| {
            BuildTarget::File(FileTarget {
                path: PathBuf::from(path),
                kind: FileKind::Script,
            })
        };
        let config = BuildConfig {
            output: Some(PathBuf::from("out/bundle.js")),
            ..BuildConfig::default()
        };
        let planned = plan(
            &[script("/repo/src/a.js"), script("/repo/src/b.js")],
            &config,
            Path::new("/repo"),
        );
        let err = check_outputs(&planned).unwrap_err();
        assert!(err.to_string().contains("out/bundle.js"));

        let pages = [
            BuildTarget::File(FileTarget {
                path: PathBuf::from("/repo/site/index.html"),
                kind: FileKind::Markup,
            }),
            BuildTarget::File(FileTarget {
                path: PathBuf::from("/repo/site/about.html"),
                kind: FileKind::Markup,
            }),
        ];
        let planned = plan(&pages, &BuildConfig::default(), Path::new("/repo"));
        assert!(check_outputs(&planned).is_ok());
    }

    #[test]
    fn test_file_targets_default_to_dist() {
        let targets = [
            BuildTarget::File(FileTarget {
                path: PathBuf::from("/repo/src/app.tsx"),
                kind: FileKind::Script,
            }),
            BuildTarget::File(FileTarget {
                path: PathBuf::from("/repo/site/index.html"),
                kind: FileKind::Markup,
            }),
        ];
        let planned = plan(&targets, &BuildConfig::default(), Path::new("/repo"));
        assert_eq!(
            outputs(&planned),
            vec![PathBuf::from("/repo/dist/app.js"), PathBuf::from("/repo/dist")]
        );
        assert_eq!(planned[0].label, "src/app.tsx");
        assert_eq!(planned[1].config.kind(), FileKind::Markup.bundler_kind());
    }
}
