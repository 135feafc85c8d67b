//! Command implementations.
//!
//! - [`build`] - one-shot build to disk
//! - [`serve`] - development server
//!
//! Each command provides an `execute` function taking its parsed arguments.

pub mod build;
pub mod serve;

use std::path::{Path, PathBuf};

use wisp_config::{ConfigLoader, ConfigOverrides, WispConfig};

use crate::error::{CliError, Result};

pub use build::execute as build_execute;
pub use serve::execute as serve_execute;

/// The project root: `--cwd` resolved against the current directory.
pub(crate) fn resolve_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) => path_clean::clean(current.join(dir)),
        None => current,
    };
    if !root.is_dir() {
        return Err(CliError::FileNotFound(root));
    }
    Ok(root)
}

/// Load, layer and validate the configuration for `root`.
pub(crate) fn load_config(
    root: &Path,
    config_file: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<WispConfig> {
    let config = ConfigLoader::new(root)
        .with_config_file(config_file)
        .load(overrides)?;
    tracing::debug!(
        mode = %config.mode,
        context = %config.context.display(),
        entries = config.entry.len(),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            resolve_root(Some(&missing)),
            Err(CliError::FileNotFound(path)) if path == missing
        ));
    }

    #[test]
    fn test_resolve_root_accepts_absolute_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_root(Some(dir.path())).unwrap(), dir.path());
    }

    #[test]
    fn test_load_config_reports_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wisp.json"), "{ \"entry\": 3 }").unwrap();
        let err = load_config(dir.path(), None, &ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
