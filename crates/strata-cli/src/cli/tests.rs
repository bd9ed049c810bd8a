#[cfg(test)]
mod tests {
    use crate::cli::validation::{parse_debounce, parse_jsx_name};
    use crate::cli::{Cli, Command, Format};
    use clap::Parser;
    use std::path::PathBuf;

    fn build(args: &[&str]) -> crate::cli::BuildArgs {
        let cli = Cli::try_parse_from(std::iter::once("strata").chain(args.iter().copied()))
            .expect("arguments parse");
        match cli.command {
            Command::Build(args) => args,
        }
    }

    #[test]
    fn test_parse_jsx_name_valid() {
        assert_eq!(parse_jsx_name("h"), Ok("h".to_string()));
        assert_eq!(
            parse_jsx_name("React.createElement"),
            Ok("React.createElement".to_string())
        );
        assert_eq!(parse_jsx_name("$jsx._frag"), Ok("$jsx._frag".to_string()));
    }

    #[test]
    fn test_parse_jsx_name_invalid() {
        assert!(parse_jsx_name("").is_err());
        assert!(parse_jsx_name("1h").is_err());
        assert!(parse_jsx_name("React..x").is_err());
        assert!(parse_jsx_name("my-factory").is_err());
    }

    #[test]
    fn test_parse_debounce() {
        assert_eq!(parse_debounce("200"), Ok(200));
        assert!(parse_debounce("0").is_err());
        assert!(parse_debounce("-5").is_err());
        assert!(parse_debounce("fast").is_err());
    }

    #[test]
    fn test_format_enum_values() {
        use clap::ValueEnum;

        let formats: Vec<_> = Format::value_variants()
            .iter()
            .map(|v| v.to_possible_value().unwrap().get_name().to_string())
            .collect();
        assert_eq!(formats, vec!["esm", "cjs", "iife"]);
    }

    #[test]
    fn test_build_no_targets() {
        let args = build(&["build"]);
        assert!(args.entries.is_empty());
        assert!(args.link.is_none());
        assert!(!args.watching());
    }

    #[test]
    fn test_build_flags() {
        let args = build(&[
            "build",
            "src/a.js",
            "src/b.css",
            "-o",
            "dist/out.js",
            "--format",
            "iife",
            "--production",
            "--no-map",
            "--no-lint",
            "--targets",
            "defaults",
        ]);
        assert_eq!(args.entries, vec!["src/a.js", "src/b.css"]);
        assert_eq!(args.output, Some(PathBuf::from("dist/out.js")));
        assert_eq!(args.format, Some(Format::Iife));
        assert!(args.production && args.no_map && args.no_lint);
        assert_eq!(args.targets.as_deref(), Some("defaults"));
    }

    #[test]
    fn test_link_without_patterns() {
        let args = build(&["build", "packages/app", "--link"]);
        assert_eq!(args.link, Some(vec![]));
    }

    #[test]
    fn test_link_with_patterns() {
        let args = build(&["build", "packages/app", "--link", "@acme/*,utils"]);
        assert_eq!(
            args.link,
            Some(vec!["@acme/*".to_string(), "utils".to_string()])
        );
    }

    #[test]
    fn test_serve_implies_watch() {
        let args = build(&["build", "--serve", "--port", "8080"]);
        assert!(args.watching());
        assert_eq!(args.port, Some(8080));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "build", "--verbose", "--no-color"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["strata", "-v", "-q", "build"]).is_err());
    }

    #[test]
    fn test_zero_debounce_rejected() {
        assert!(Cli::try_parse_from(["strata", "build", "--debounce", "0"]).is_err());
    }

    #[test]
    fn test_jsx_flags() {
        let args = build(&[
            "build",
            "src/app.jsx",
            "--jsx-factory",
            "h",
            "--jsx-fragment",
            "Fragment",
            "--jsx-import-source",
            "preact",
        ]);
        assert_eq!(args.jsx_factory.as_deref(), Some("h"));
        assert_eq!(args.jsx_fragment.as_deref(), Some("Fragment"));
        assert_eq!(args.jsx_import_source.as_deref(), Some("preact"));
    }
}
