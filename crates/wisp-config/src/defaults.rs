//! Default values for configuration fields.
//!
//! Used by both `serde(default = "...")` attributes and the `Default` impls so
//! a missing field and an absent section resolve to the same value.

use std::path::PathBuf;

use crate::bundle::{StageName, TransformRule};

pub const DEFAULT_INLINE_LIMIT: u64 = 5000;
pub const DEFAULT_PORT: u16 = 3000;

pub fn default_context() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub fn default_filename() -> String {
    "[name].js".to_string()
}

pub fn default_public_path() -> String {
    "/".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_inline_limit() -> u64 {
    DEFAULT_INLINE_LIMIT
}

pub fn default_asset_name() -> String {
    "[name]-[hash].[ext]".to_string()
}

pub fn default_extensions() -> Vec<String> {
    [".js", ".mjs", ".cjs", ".json", ".css"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_module_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}

pub fn default_main_fields() -> Vec<String> {
    vec!["browser".to_string(), "module".to_string(), "main".to_string()]
}

pub fn default_html_filename() -> String {
    "index.html".to_string()
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    DEFAULT_PORT
}

pub fn default_debounce_ms() -> u64 {
    100
}

pub fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("public"))
}

pub fn default_fallback_index() -> String {
    "index.html".to_string()
}

pub fn default_method() -> String {
    "GET".to_string()
}

pub fn default_status() -> u16 {
    200
}

/// Rules applied when a configuration declares none.
///
/// Scripts outside `node_modules` are downleveled, stylesheets become
/// injectable glue, images and fonts go through the asset stage.
pub fn default_rules() -> Vec<TransformRule> {
    vec![
        TransformRule::new(r"\.(m|c)?js$", [StageName::Downlevel]).exclude("node_modules"),
        TransformRule::new(r"\.css$", [StageName::Style]),
        TransformRule::new(
            r"\.(png|jpe?g|gif|svg|webp|ico|woff2?|ttf|eot)$",
            [StageName::Asset],
        ),
        TransformRule::new(r"\.json$", [StageName::Json]),
    ]
}
