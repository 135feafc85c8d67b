//! `wisp build`: build once, write the output directory, exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use wisp_bundler::output::writer::write_artifacts;
use wisp_bundler::{BuildError, Bundler, BundlerRuntime, EmitOptions};
use wisp_config::{ConfigOverrides, WispConfig};

use crate::cli::BuildArgs;
use crate::commands::{load_config, resolve_root};
use crate::error::{CliError, Result};
use crate::ui;

/// What a successful build wrote.
#[derive(Debug)]
pub struct BuildReport {
    /// Output-relative file names with their sizes, in emit order.
    pub files: Vec<(String, u64)>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Execute the build command.
///
/// # Errors
///
/// - [`CliError::Config`] when the configuration is invalid; nothing is
///   written.
/// - [`CliError::BuildFailed`] when any entry failed; every error has been
///   printed as a diagnostic before returning.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let root = resolve_root(args.cwd.as_deref())?;
    let overrides = ConfigOverrides::default()
        .with_mode(args.mode)
        .with_out_dir(args.out_dir.clone());
    let config = Arc::new(load_config(&root, args.config.clone(), &overrides)?);

    let spinner = ui::Spinner::new(&format!(
        "Building {} entr{} in {} mode",
        config.entry.len(),
        if config.entry.len() == 1 { "y" } else { "ies" },
        config.mode
    ));

    let result = tokio::task::spawn_blocking({
        let config = Arc::clone(&config);
        move || run(config)
    })
    .await
    .map_err(|e| CliError::Custom(format!("build task failed: {e}")))?;

    match result {
        Ok(report) => {
            spinner.finish(&format!(
                "Built {} files in {}",
                report.files.len(),
                ui::format_duration(report.elapsed)
            ));
            for warning in &report.warnings {
                ui::warning(warning);
            }
            ui::print_build_summary(&report.files, report.elapsed);
            ui::success(&format!("Output written to {}", config.out_dir().display()));
            Ok(())
        }
        Err(failure) => {
            spinner.fail("Build failed");
            Err(failure.report())
        }
    }
}

/// A failed build with every error it collected.
#[derive(Debug)]
pub struct BuildFailure {
    pub errors: Vec<BuildError>,
    pub failed_entries: Vec<String>,
}

impl BuildFailure {
    /// Print each error as a diagnostic and return the summary error.
    fn report(self) -> CliError {
        let count = self.errors.len();
        let mut errors = self.errors;
        if count == 1 && self.failed_entries.is_empty() {
            if let Some(only) = errors.pop() {
                return CliError::Build(only);
            }
        }
        for error in errors {
            eprintln!("{:?}", miette::Report::new(error));
        }
        CliError::BuildFailed {
            errors: count,
            failed_entries: self.failed_entries,
        }
    }
}

impl From<BuildError> for BuildFailure {
    fn from(error: BuildError) -> Self {
        Self {
            errors: vec![error],
            failed_entries: Vec::new(),
        }
    }
}

/// Build, emit and write synchronously. Used by [`execute`] on a blocking
/// thread and directly by tests.
pub fn run(config: Arc<WispConfig>) -> std::result::Result<BuildReport, BuildFailure> {
    let started = Instant::now();
    let runtime = BundlerRuntime::new(&config.context);
    let bundler = Bundler::new(Arc::clone(&config), Arc::new(runtime))?;

    let outcome = bundler.build();
    let warnings: Vec<String> = outcome.warnings.iter().map(ToString::to_string).collect();
    if !outcome.is_success() {
        return Err(BuildFailure {
            errors: outcome.errors,
            failed_entries: outcome.failed_entries.into_iter().collect(),
        });
    }

    let artifacts = bundler.emit(&outcome.graph, &EmitOptions::default())?;
    write_artifacts(&artifacts, &config.out_dir(), config.output.clean)?;
    tracing::info!(
        files = artifacts.len(),
        bytes = artifacts.total_size(),
        dir = %config.out_dir().display(),
        "build written"
    );

    let files = artifacts
        .files()
        .map(|(name, content)| (name.to_string(), content.len() as u64))
        .collect();
    Ok(BuildReport {
        files,
        warnings,
        elapsed: started.elapsed(),
    })
}
