//! File-based config discovery for CLI use.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Where a configuration was found.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Toml(PathBuf),
    Json(PathBuf),
    /// The `wisp` field of a `package.json`.
    PackageJson { path: PathBuf, value: Value },
}

impl ConfigSource {
    /// Classify an explicitly named config file by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if path.file_name().and_then(|n| n.to_str()) == Some("package.json") {
            return load_package_field(path)?
                .map(|value| Self::PackageJson {
                    path: path.to_path_buf(),
                    value,
                })
                .ok_or_else(|| ConfigError::MissingField {
                    field: "wisp".to_string(),
                    hint: "Add a 'wisp' field to your package.json".to_string(),
                });
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml(path.to_path_buf())),
            Some("json") => Ok(Self::Json(path.to_path_buf())),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Toml(path) | Self::Json(path) => path,
            Self::PackageJson { path, .. } => path,
        }
    }
}

/// Searches a project root for a configuration file.
///
/// Order: `wisp.toml`, `wisp.json`, then the `wisp` field of `package.json`.
///
/// ```no_run
/// use wisp_config::ConfigDiscovery;
///
/// let source = ConfigDiscovery::new(".").find().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn find(&self) -> Result<Option<ConfigSource>> {
        let toml_path = self.root.join("wisp.toml");
        if toml_path.is_file() {
            return Ok(Some(ConfigSource::Toml(toml_path)));
        }

        let json_path = self.root.join("wisp.json");
        if json_path.is_file() {
            return Ok(Some(ConfigSource::Json(json_path)));
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.is_file() {
            if let Some(value) = load_package_field(&pkg_path)? {
                return Ok(Some(ConfigSource::PackageJson {
                    path: pkg_path,
                    value,
                }));
            }
        }

        Ok(None)
    }

    /// Like [`find`](Self::find) but a missing config is an error.
    pub fn require(&self) -> Result<ConfigSource> {
        self.find()?
            .ok_or_else(|| ConfigError::NotFound(self.root.clone()))
    }
}

fn load_package_field(path: &Path) -> Result<Option<Value>> {
    let content = fs::read_to_string(path)?;
    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(parsed.get("wisp").filter(|v| !v.is_null()).cloned())
}
