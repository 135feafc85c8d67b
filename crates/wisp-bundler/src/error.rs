//! Build errors and warnings.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use wisp_config::{ConfigError, StageName};
use wisp_graph::{ModuleId, RuntimeError};

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// A stage could not convert the file to runnable content.
    #[error("{stage} stage failed for {path}: {message}")]
    #[diagnostic(
        code(wisp::transform),
        help("Fix the source file; the dev server keeps serving the last good build")
    )]
    Transform {
        path: PathBuf,
        stage: &'static str,
        message: String,
    },

    /// No rule matches a file some module imports.
    #[error("no transform rule matches {path} (imported by {importer})")]
    #[diagnostic(
        code(wisp::unresolved_transform),
        help("Add a rule to `module.rules` whose `test` matches this file")
    )]
    UnresolvedTransform { path: PathBuf, importer: PathBuf },

    #[error("cannot resolve '{specifier}' from {importer} (entry '{entry}')")]
    #[diagnostic(
        code(wisp::module_not_found),
        help("Check the path, `resolve.extensions` and `resolve.modules`")
    )]
    ModuleNotFound {
        specifier: String,
        importer: PathBuf,
        entry: String,
    },

    #[error("entry '{name}' not found: {path}")]
    #[diagnostic(code(wisp::entry_not_found), help("Check the `entry` table"))]
    EntryNotFound { name: String, path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    #[diagnostic(code(wisp::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(wisp::runtime))]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    #[diagnostic(code(wisp::config))]
    Config(#[from] ConfigError),

    #[error("output path '{file}' escapes {}", dir.display())]
    #[diagnostic(code(wisp::invalid_output_path))]
    InvalidOutputPath { file: String, dir: PathBuf },

    #[error("failed to render {file}: {message}")]
    #[diagnostic(code(wisp::template), help("Check the html template syntax"))]
    Template { file: String, message: String },
}

impl BuildError {
    pub fn transform(path: impl Into<PathBuf>, stage: StageName, message: impl fmt::Display) -> Self {
        Self::Transform {
            path: path.into(),
            stage: stage.as_str(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path of the file the error is about, if any. The dev server uses it to
    /// decide which change can clear a failure.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Transform { path, .. }
            | Self::UnresolvedTransform { path, .. }
            | Self::EntryNotFound { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::ModuleNotFound { importer, .. } => Some(importer),
            Self::InvalidOutputPath { dir, .. } => Some(dir),
            Self::Runtime(_) | Self::Config(_) | Self::Template { .. } => None,
        }
    }
}

/// A dependency cycle found while building. Never fatal: modules inside the
/// cycle are emitted in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleWarning {
    pub cycle: Vec<ModuleId>,
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("circular dependency: ")?;
        for (i, id) in self.cycle.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", id.path_string())?;
        }
        if let Some(first) = self.cycle.first() {
            write!(f, " -> {}", first.path_string())?;
        }
        Ok(())
    }
}
