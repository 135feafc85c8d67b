//! Shared test utilities for wisp-bundler integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use wisp_bundler::{BuildArtifacts, Bundler, BundlerRuntime, EmitOptions};
use wisp_config::WispConfig;

/// A project on disk in a temporary directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let project = Self {
            dir: TempDir::new().unwrap(),
        };
        for (path, content) in files {
            project.write(path, content);
        }
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// A config rooted at the project, with `overrides` merged on top.
    pub fn config(&self, overrides: Value) -> WispConfig {
        let mut value = json!({ "context": self.root() });
        wisp_config::merge_values(&mut value, &overrides);
        WispConfig::from_value(value).unwrap()
    }

    pub fn bundler(&self, overrides: Value) -> Bundler {
        let config = self.config(overrides);
        let runtime = BundlerRuntime::new(self.root());
        Bundler::new(Arc::new(config), Arc::new(runtime)).unwrap()
    }
}

/// Build and emit, failing the test on any build error.
pub fn build_artifacts(bundler: &Bundler) -> BuildArtifacts {
    let outcome = bundler.build();
    assert!(outcome.is_success(), "build failed: {:?}", outcome.errors);
    bundler.emit(&outcome.graph, &EmitOptions::default()).unwrap()
}

pub fn text(artifacts: &BuildArtifacts, name: &str) -> String {
    let content = artifacts
        .get(name)
        .unwrap_or_else(|| panic!("no output file {name}"));
    String::from_utf8(content.to_vec()).unwrap()
}
