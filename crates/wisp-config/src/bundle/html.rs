use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::default_html_filename;

/// HTML document generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HtmlOptions {
    /// Template rendered with `parameters` and `mode` in scope. Without one a
    /// minimal document is generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    #[serde(default = "default_html_filename")]
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            template: None,
            filename: default_html_filename(),
            title: None,
            parameters: IndexMap::new(),
        }
    }
}

/// A file copied verbatim into the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CopyPattern {
    pub from: PathBuf,
    /// Destination relative to the output directory.
    pub to: PathBuf,
}
