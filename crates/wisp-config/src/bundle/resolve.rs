use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults::{default_extensions, default_main_fields, default_module_dirs};

/// Module resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolveOptions {
    /// Extensions probed, in order, for extension-less specifiers.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directories searched for bare specifiers, walking up from the importer.
    #[serde(default = "default_module_dirs")]
    pub modules: Vec<PathBuf>,

    /// `package.json` fields consulted for a package's entry file.
    #[serde(default = "default_main_fields")]
    pub main_fields: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            modules: default_module_dirs(),
            main_fields: default_main_fields(),
        }
    }
}
