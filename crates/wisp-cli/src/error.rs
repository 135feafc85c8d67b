//! Error handling for the wisp CLI.
//!
//! `CliError` wraps the library errors (`ConfigError` from configuration
//! loading, `BuildError` from the bundler) together with the failures only
//! the CLI can hit: binding the server, watching files, writing output.
//!
//! # Example
//!
//! ```rust,no_run
//! use wisp_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_template(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

mod report;

use std::path::PathBuf;
use thiserror::Error;
use wisp_bundler::BuildError;
use wisp_config::ConfigError;

pub use report::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration; nothing is built or served.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single bundler error outside the per-module error list.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// One or more entry points failed; the errors were already printed.
    #[error("Build failed with {errors} error(s){}", failed_entries_suffix(.failed_entries))]
    BuildFailed {
        errors: usize,
        failed_entries: Vec<String>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

fn failed_entries_suffix(entries: &[String]) -> String {
    if entries.is_empty() {
        String::new()
    } else {
        format!(" (failed entries: {})", entries.join(", "))
    }
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Append a hint line to the error message.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_error_from_config_error() {
        let cli_err: CliError = ConfigError::NotFound(PathBuf::from("wisp.toml")).into();
        assert!(matches!(cli_err, CliError::Config(_)));
        assert!(cli_err.to_string().contains("wisp.toml"));
    }

    #[test]
    fn test_cli_error_from_build_error() {
        let build_err = BuildError::EntryNotFound {
            name: "main".to_string(),
            path: PathBuf::from("/app/src/index.js"),
        };
        let cli_err: CliError = build_err.into();
        assert!(matches!(cli_err, CliError::Build(_)));
    }

    #[test]
    fn test_build_failed_names_entries() {
        let err = CliError::BuildFailed {
            errors: 2,
            failed_entries: vec!["admin".to_string()],
        };
        assert_eq!(err.to_string(), "Build failed with 2 error(s) (failed entries: admin)");

        let err = CliError::BuildFailed {
            errors: 1,
            failed_entries: Vec::new(),
        };
        assert_eq!(err.to_string(), "Build failed with 1 error(s)");
    }

    #[test]
    fn test_result_ext_with_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let err = result.with_path("/test/path.txt").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn test_result_ext_keeps_other_io_errors() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path("/test/path.txt").unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_result_ext_with_hint() {
        let result: std::result::Result<(), ConfigError> =
            Err(ConfigError::NotFound(PathBuf::from("wisp.toml")));
        let msg = result.with_hint("Try creating the file").unwrap_err().to_string();
        assert!(msg.contains("Hint: Try creating the file"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), ConfigError> =
            Err(ConfigError::NotFound(PathBuf::from("wisp.toml")));
        let msg = result.context("Failed to load").unwrap_err().to_string();
        assert!(msg.starts_with("Failed to load: "));
    }
}
