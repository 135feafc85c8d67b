//! Bundler-side [`Runtime`] implementation.
//!
//! `BundlerRuntime` checks an in-memory overlay first and falls back to the
//! filesystem. Tests build whole projects in memory with it; the dev server
//! leaves the overlay empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use wisp_graph::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
pub struct BundlerRuntime {
    virtual_files: Arc<RwLock<FxHashMap<PathBuf, Arc<[u8]>>>>,
    /// Relative paths resolve against this directory.
    cwd: PathBuf,
    /// When set, only virtual files exist.
    virtual_only: bool,
}

impl BundlerRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            virtual_files: Arc::new(RwLock::new(FxHashMap::default())),
            cwd: cwd.into(),
            virtual_only: false,
        }
    }

    /// A runtime that never touches the disk.
    pub fn in_memory(cwd: impl Into<PathBuf>) -> Self {
        Self {
            virtual_only: true,
            ..Self::new(cwd)
        }
    }

    /// Add or replace a virtual file. The path is normalized before storage.
    pub fn add_virtual_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let normalized = self.normalize(path.as_ref());
        let content: Vec<u8> = content.into();
        self.virtual_files.write().insert(normalized, Arc::from(content));
    }

    pub fn remove_virtual_file(&self, path: impl AsRef<Path>) -> bool {
        let normalized = self.normalize(path.as_ref());
        self.virtual_files.write().remove(&normalized).is_some()
    }

    pub fn has_virtual_file(&self, path: &Path) -> bool {
        let normalized = self.normalize(path);
        self.virtual_files.read().contains_key(&normalized)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.cwd.join(path).clean()
        }
    }

    /// A directory exists virtually when some virtual file lives below it.
    fn is_virtual_dir(&self, path: &Path) -> bool {
        self.virtual_files
            .read()
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

impl Runtime for BundlerRuntime {
    fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let normalized = self.normalize(path);
        if let Some(content) = self.virtual_files.read().get(&normalized) {
            return Ok(content.to_vec());
        }
        if self.virtual_only {
            return Err(RuntimeError::FileNotFound(normalized));
        }

        std::fs::read(&normalized).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::FileNotFound(normalized.clone())
            } else {
                RuntimeError::Io(format!("Failed to read {}: {}", normalized.display(), e))
            }
        })
    }

    fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let normalized = self.normalize(path);
        if let Some(content) = self.virtual_files.read().get(&normalized) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
            });
        }
        if self.is_virtual_dir(&normalized) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
            });
        }
        if self.virtual_only {
            return Err(RuntimeError::FileNotFound(normalized));
        }

        let metadata = std::fs::metadata(&normalized).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuntimeError::FileNotFound(normalized.clone())
            } else {
                RuntimeError::Io(format!(
                    "Failed to get metadata for {}: {}",
                    normalized.display(),
                    e
                ))
            }
        })?;
        Ok(FileMetadata {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            is_file: metadata.is_file(),
        })
    }
}
