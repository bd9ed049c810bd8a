use crate::cli::{BuildArgs, Format};
use crate::config::{BuildConfig, CONFIG_FILE};
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format as _, Json, Serialized},
    Figment,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Top-level keys accepted from `STRATA_*` variables.
const ENV_KEYS: &[&str] = &[
    "output",
    "format",
    "targets",
    "production",
    "map",
    "lint",
    "jsx",
    "debounce_ms",
    "watch_ignore",
    "port",
    "link",
    "recursive",
];

/// Flags that were actually given on the command line. Unset flags are left
/// out so they don't shadow lower layers.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    production: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    map: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lint: Option<bool>,
    #[serde(skip_serializing_if = "JsxOverrides::is_empty")]
    jsx: JsxOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recursive: Option<bool>,
}

#[derive(Debug, Default, Serialize)]
struct JsxOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    factory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fragment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    import_source: Option<String>,
}

impl JsxOverrides {
    fn is_empty(&self) -> bool {
        self.factory.is_none() && self.fragment.is_none() && self.import_source.is_none()
    }
}

impl CliOverrides {
    fn from_args(args: &BuildArgs) -> Self {
        Self {
            output: args.output.clone(),
            format: args.format,
            targets: args.targets.clone(),
            production: args.production.then_some(true),
            map: args.no_map.then_some(false),
            lint: args.no_lint.then_some(false),
            jsx: JsxOverrides {
                factory: args.jsx_factory.clone(),
                fragment: args.jsx_fragment.clone(),
                import_source: args.jsx_import_source.clone(),
            },
            debounce_ms: args.debounce,
            port: args.port,
            link: args.link.clone(),
            recursive: args.recursive.then_some(true),
        }
    }
}

impl BuildConfig {
    /// Load configuration for the project at `root`.
    ///
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(args: &BuildArgs, root: &Path) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = Self::config_file(args, root)? {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Json::file(path));
        }

        figment = figment.merge(
            Env::prefixed("STRATA_")
                .split("__")
                .filter(|key| {
                    let key = key.as_str().to_ascii_lowercase();
                    ENV_KEYS.iter().any(|k| {
                        key == *k
                            || key.starts_with(&format!("{k}."))
                            || key.starts_with(&format!("{k}__"))
                    })
                }),
        );

        figment = figment.merge(Serialized::defaults(CliOverrides::from_args(args)));

        let config: Self = figment.extract().map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// `--config` (relative to `root`) when given, else `strata.json` if present.
    fn config_file(args: &BuildArgs, root: &Path) -> Result<Option<PathBuf>> {
        if let Some(path) = &args.config {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            if !path.is_file() {
                return Err(ConfigError::NotFound(path).into());
            }
            return Ok(Some(path));
        }

        let default_path = root.join(CONFIG_FILE);
        Ok(default_path.is_file().then_some(default_path))
    }
}
