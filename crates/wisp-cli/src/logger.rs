//! Logging setup for the wisp CLI.
//!
//! Library crates only emit `tracing` events; this module installs the one
//! subscriber, once, at process start.
//!
//! # Example
//!
//! ```rust,no_run
//! use wisp_cli::logger::init_logger;
//! use tracing::info;
//!
//! init_logger(false, false, false);
//! info!("starting build");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 4] = ["wisp_cli", "wisp_bundler", "wisp_graph", "wisp_config"];

/// Initialize the tracing subscriber.
///
/// The level is picked in this order:
/// 1. `--verbose`: DEBUG for the wisp crates
/// 2. `--quiet`: ERROR only
/// 3. `RUST_LOG`, when set
/// 4. INFO for the wisp crates
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .without_time()
                .with_ansi(!no_color && should_use_colors())
                .compact(),
        )
        .try_init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(directives("debug"))
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    }
}

fn directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether log output may carry ANSI colors.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them; otherwise stderr
/// must be a color-capable terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_directives_cover_every_crate() {
        assert_eq!(
            directives("debug"),
            "wisp_cli=debug,wisp_bundler=debug,wisp_graph=debug,wisp_config=debug"
        );
    }

    #[test]
    #[serial]
    fn test_should_use_colors_respects_no_color() {
        unsafe {
            std::env::set_var("NO_COLOR", "1");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(!should_use_colors());
        unsafe {
            std::env::remove_var("NO_COLOR");
        }
        assert!(should_use_colors());
        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }

    #[test]
    fn test_init_logger_twice_is_harmless() {
        init_logger(false, true, true);
        init_logger(true, false, true);
    }
}
