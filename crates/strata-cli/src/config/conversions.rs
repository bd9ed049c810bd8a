use std::path::{Path, PathBuf};

use strata_bundler::{BaseOptions, InputSource, JsxOptions};

use crate::config::BuildConfig;

impl BuildConfig {
    pub fn jsx_options(&self) -> JsxOptions {
        JsxOptions {
            factory: self.jsx.factory.clone(),
            fragment: self.jsx.fragment.clone(),
            import_source: self.jsx.import_source.clone(),
        }
    }

    /// Shared bundle options for one input/output pair under `root`.
    pub fn base_options(&self, input: PathBuf, output: Option<PathBuf>, root: &Path) -> BaseOptions {
        BaseOptions {
            input: vec![InputSource::File(input)],
            output,
            root: root.to_path_buf(),
            targets: self.targets.clone(),
            production: self.production,
            map: self.map,
            lint: self.lint,
        }
    }
}
