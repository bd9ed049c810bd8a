#[cfg(test)]
mod tests {
    use crate::cli::{BuildArgs, Format};
    use crate::config::BuildConfig;
    use crate::error::{CliError, ConfigError};
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig::load(&BuildArgs::default(), dir.path()).unwrap();

        assert_eq!(config.debounce_ms, 200);
        assert_eq!(config.watch_ignore, vec!["node_modules", ".git"]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.format, Format::Esm);
        assert!(config.map && config.lint);
        assert!(config.link.is_none());
    }

    #[test]
    #[serial]
    fn test_file_then_cli_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("strata.json"),
            r#"{ "debounce_ms": 500, "production": true, "jsx": { "factory": "h" } }"#,
        )
        .unwrap();

        let args = BuildArgs {
            debounce: Some(50),
            no_map: true,
            ..BuildArgs::default()
        };
        let config = BuildConfig::load(&args, dir.path()).unwrap();

        assert_eq!(config.debounce_ms, 50);
        assert!(config.production);
        assert!(!config.map);
        assert_eq!(config.jsx.factory.as_deref(), Some("h"));
    }

    #[test]
    #[serial]
    fn test_cli_jsx_merges_with_file_jsx() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("strata.json"),
            r#"{ "jsx": { "factory": "h" } }"#,
        )
        .unwrap();

        let args = BuildArgs {
            jsx_fragment: Some("Fragment".to_string()),
            ..BuildArgs::default()
        };
        let config = BuildConfig::load(&args, dir.path()).unwrap();
        assert_eq!(config.jsx.factory.as_deref(), Some("h"));
        assert_eq!(config.jsx.fragment.as_deref(), Some("Fragment"));
    }

    #[test]
    #[serial]
    fn test_env_layer() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strata.json"), r#"{ "port": 4000 }"#).unwrap();

        std::env::set_var("STRATA_PORT", "5000");
        std::env::set_var("STRATA_JSX__IMPORT_SOURCE", "preact");
        let config = BuildConfig::load(&BuildArgs::default(), dir.path());
        std::env::remove_var("STRATA_PORT");
        std::env::remove_var("STRATA_JSX__IMPORT_SOURCE");

        let config = config.unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.jsx.import_source.as_deref(), Some("preact"));
    }

    #[test]
    #[serial]
    fn test_unknown_env_vars_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("STRATA_HOME", "/opt/strata");
        let result = BuildConfig::load(&BuildArgs::default(), dir.path());
        std::env::remove_var("STRATA_HOME");
        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn test_explicit_config_missing() {
        let dir = TempDir::new().unwrap();
        let args = BuildArgs {
            config: Some(PathBuf::from("custom.json")),
            ..BuildArgs::default()
        };
        let err = BuildConfig::load(&args, dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    #[serial]
    fn test_unknown_file_key_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strata.json"), r#"{ "minify": true }"#).unwrap();
        let err = BuildConfig::load(&BuildArgs::default(), dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Load(_))));
    }

    #[test]
    #[serial]
    fn test_zero_debounce_in_file_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("strata.json"), r#"{ "debounce_ms": 0 }"#).unwrap();
        let err = BuildConfig::load(&BuildArgs::default(), dir.path()).unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "debounce_ms"
        ));
    }

    #[test]
    fn test_fragment_without_factory_invalid() {
        let mut config = BuildConfig::default();
        config.jsx.fragment = Some("Fragment".to_string());
        assert!(config.validate().is_err());

        config.jsx.import_source = Some("preact".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_options_carry_flags() {
        let config = BuildConfig {
            production: true,
            map: false,
            targets: Some("defaults".to_string()),
            ..BuildConfig::default()
        };
        let base = config.base_options(
            PathBuf::from("/p/src/a.js"),
            Some(PathBuf::from("/p/dist/a.js")),
            std::path::Path::new("/p"),
        );
        assert!(base.production);
        assert!(!base.map);
        assert!(base.lint);
        assert_eq!(base.targets.as_deref(), Some("defaults"));
        assert_eq!(base.root, PathBuf::from("/p"));
    }
}
