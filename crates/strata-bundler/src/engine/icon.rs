//! Icon engine: the source image copied under each configured name.

use std::path::PathBuf;

use async_trait::async_trait;

use super::resolve::normalize;
use super::{mismatch, output_dir, Bundler};
use crate::config::{BundleConfig, BundlerKind};
use crate::error::{BundleError, Result};
use crate::output::{BuildOutput, OutputFile};

/// Stateless; icons are binary and always re-read.
#[derive(Debug, Default)]
pub struct IconEngine;

#[async_trait]
impl Bundler for IconEngine {
    fn kind(&self) -> BundlerKind {
        BundlerKind::Icon
    }

    async fn build(
        &mut self,
        config: &BundleConfig,
        _invalidated: &[PathBuf],
    ) -> Result<BuildOutput> {
        let BundleConfig::Icon(options) = config else {
            return Err(mismatch(self.kind(), config));
        };
        let base = &options.base;
        let out_dir = output_dir(config)?;

        let mut inputs = base.input_files();
        let Some(source) = inputs.next() else {
            return Err(BundleError::Build {
                input: String::new(),
                message: "no icon file to copy".to_string(),
            });
        };
        let source = normalize(&base.resolve(source));

        let mut output = BuildOutput::default();
        if inputs.next().is_some() {
            output.warnings.push(format!(
                "only the first icon input is used ({})",
                source.display()
            ));
        }

        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| BundleError::Read {
                path: source.clone(),
                source: e,
            })?;
        for name in &options.names {
            output
                .outputs
                .push(OutputFile::new(out_dir.join(name), bytes.clone()));
        }
        output.files.insert(source);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseOptions, IconOptions};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copies_under_each_name() {
        let dir = TempDir::new().unwrap();
        let root = normalize(dir.path());
        fs::write(root.join("logo.png"), [1u8, 2, 3]).unwrap();

        let config =
            BundleConfig::Icon(IconOptions::new(BaseOptions::file("logo.png", "out").with_root(&root)));
        let output = IconEngine.build(&config, &[]).await.unwrap();

        assert_eq!(output.outputs.len(), 2);
        assert_eq!(output.outputs[0].path, root.join("out/favicon.png"));
        assert_eq!(output.outputs[1].path, root.join("out/apple-touch-icon.png"));
        assert!(output.outputs.iter().all(|o| o.contents == vec![1u8, 2, 3]));
        assert_eq!(output.files.len(), 1);
    }
}
