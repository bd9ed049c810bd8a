//! Web manifest engine.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::resolve::normalize;
use super::{mismatch, output_dir, Bundler, SourceCache};
use crate::config::{BundleConfig, BundlerKind, ManifestOptions, ManifestOverrides};
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

#[derive(Debug, Default)]
pub struct ManifestEngine {
    cache: SourceCache,
}

#[async_trait]
impl Bundler for ManifestEngine {
    fn kind(&self) -> BundlerKind {
        BundlerKind::Manifest
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let BundleConfig::Manifest(options) = config else {
            return Err(mismatch(self.kind(), config));
        };
        self.cache.invalidate(invalidated);
        let result = self.assemble(config, options).await;
        self.cache.settle(&result);
        result
    }
}

impl ManifestEngine {
    async fn assemble(
        &mut self,
        config: &BundleConfig,
        options: &ManifestOptions,
    ) -> Result<BuildOutput> {
        let base = &options.base;
        let out_dir = output_dir(config)?;
        let mut output = BuildOutput::default();

        for input in base.input_files() {
            let path = normalize(&base.resolve(input));
            let text = self.cache.read(&path).await?;
            output.files.insert(path.clone());

            let mut manifest: Value =
                serde_json::from_str(&text).map_err(|source| BundleError::Json {
                    path: path.clone(),
                    source,
                })?;
            let Some(fields) = manifest.as_object_mut() else {
                return Err(BundleError::Build {
                    input: path.display().to_string(),
                    message: "a web manifest must be a JSON object".to_string(),
                });
            };
            apply_overrides(fields, &options.overrides);

            let manifest_dir = path.parent().map(PathBuf::from).unwrap_or_default();
            for src in icon_sources(&manifest) {
                let icon = manifest_dir.join(&src);
                if !icon.is_file() {
                    output
                        .warnings
                        .push(format!("icon '{src}' listed in the manifest does not exist"));
                    continue;
                }
                let bytes = tokio::fs::read(&icon)
                    .await
                    .map_err(|source| BundleError::Read {
                        path: icon.clone(),
                        source,
                    })?;
                output.files.insert(normalize(&icon));
                output
                    .outputs
                    .push(OutputFile::new(out_dir.join(src.trim_start_matches("./")), bytes));
            }

            let rendered = if base.production {
                serde_json::to_string(&manifest)
            } else {
                serde_json::to_string_pretty(&manifest)
            }
            .map_err(|source| BundleError::Json {
                path: path.clone(),
                source,
            })?;

            let name = path.file_name().map(PathBuf::from).unwrap_or_default();
            output
                .outputs
                .insert(0, OutputFile::new(out_dir.join(name), format!("{rendered}\n")));
        }

        Ok(output)
    }
}

fn apply_overrides(fields: &mut serde_json::Map<String, Value>, overrides: &ManifestOverrides) {
    let pairs = [
        ("name", &overrides.name),
        ("short_name", &overrides.short_name),
        ("start_url", &overrides.start_url),
        ("theme_color", &overrides.theme_color),
    ];
    for (key, value) in pairs {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::String(value.clone()));
        }
    }
}

/// Local icon paths from the `icons` array.
fn icon_sources(manifest: &Value) -> Vec<String> {
    manifest
        .get("icons")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|icon| icon.get("src").and_then(Value::as_str))
        .filter(|src| !src.contains("://") && !src.starts_with('/') && !src.starts_with("data:"))
        .map(str::to_string)
        .collect()
}
