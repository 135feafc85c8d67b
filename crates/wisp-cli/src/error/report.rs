//! Conversion from CLI errors to miette reports.

use miette::Report;

use super::CliError;

/// Convert a [`CliError`] into a miette report for the process exit.
///
/// Bundler errors keep their diagnostic code and help text.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Config(e) => miette::miette!(
            code = "wisp::config",
            help = "Fix the configuration file or the WISP_* environment variables",
            "{}",
            e
        ),
        other => miette::miette!("{}", other),
    }
}
