use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults::{default_filename, default_out_dir, default_public_path, default_true};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputOptions {
    /// Output directory, relative to the project context.
    #[serde(default = "default_out_dir")]
    pub path: PathBuf,

    /// Chunk file name template. Supports `[name]` and `[hash]`.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// URL prefix under which emitted files are served.
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Empty the output directory before a one-shot build writes to it.
    #[serde(default = "default_true")]
    pub clean: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: default_out_dir(),
            filename: default_filename(),
            public_path: default_public_path(),
            clean: true,
        }
    }
}
