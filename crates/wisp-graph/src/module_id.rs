use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const VIRTUAL_PREFIX: &str = "virtual:";

/// Identifier for a module in the graph.
///
/// Real modules are identified by their cleaned absolute path. Modules that do
/// not live on disk (externals) carry a `virtual:` prefix instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(PathBuf);

impl ModuleId {
    /// Create an identifier from an absolute filesystem path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();

        if path.as_os_str().is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }
        if path.to_string_lossy().starts_with(VIRTUAL_PREFIX) {
            return Ok(Self(path.to_path_buf()));
        }
        if !path.is_absolute() {
            return Err(ModuleIdError::Relative(path.to_path_buf()));
        }

        Ok(Self(path.clean()))
    }

    /// Create an identifier for a module with no file behind it.
    pub fn new_virtual(id: impl AsRef<str>) -> Self {
        let id = id.as_ref();
        if id.starts_with(VIRTUAL_PREFIX) {
            Self(PathBuf::from(id))
        } else {
            Self(PathBuf::from(format!("{VIRTUAL_PREFIX}{id}")))
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn is_virtual(&self) -> bool {
        self.path_string().starts_with(VIRTUAL_PREFIX)
    }

    pub fn path_string(&self) -> Cow<'_, str> {
        self.0.to_string_lossy()
    }

    /// Stable, machine-independent name relative to `root`, e.g. `./src/app.js`.
    ///
    /// Virtual ids and paths outside `root` are returned unchanged.
    pub fn display_relative(&self, root: &Path) -> String {
        match self.0.strip_prefix(root) {
            Ok(rel) if !self.is_virtual() => {
                let rel = rel.to_string_lossy().replace('\\', "/");
                format!("./{rel}")
            }
            _ => self.path_string().replace('\\', "/"),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_string())
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.path_string())
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum ModuleIdError {
    #[error("module path is empty")]
    EmptyPath,

    #[error("module path must be absolute: {0}")]
    Relative(PathBuf),
}
