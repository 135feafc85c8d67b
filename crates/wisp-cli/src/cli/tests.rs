#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;
    use wisp_config::Mode;

    #[test]
    fn test_build_defaults() {
        let cli = Cli::try_parse_from(["wisp", "build"]).unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert!(args.mode.is_none());
        assert!(args.out_dir.is_none());
        assert!(args.cwd.is_none());
    }

    #[test]
    fn test_build_flags() {
        let cli = Cli::try_parse_from([
            "wisp", "build", "--mode", "prod", "--out-dir", "public", "-C", "app", "--config",
            "wisp.json",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.mode, Some(Mode::Production));
        assert_eq!(args.out_dir, Some(PathBuf::from("public")));
        assert_eq!(args.cwd, Some(PathBuf::from("app")));
        assert_eq!(args.config, Some(PathBuf::from("wisp.json")));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["wisp", "build", "--mode", "staging"]).is_err());
    }

    #[test]
    fn test_serve_flags() {
        let cli =
            Cli::try_parse_from(["wisp", "serve", "--port", "4000", "--host", "0.0.0.0", "--no-hmr"])
                .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(4000));
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert!(args.no_hmr);
    }

    #[test]
    fn test_port_must_be_numeric() {
        assert!(Cli::try_parse_from(["wisp", "serve", "--port", "http"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["wisp", "serve", "-v", "--no-color"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["wisp", "-v", "-q", "build"]).is_err());
    }
}
