//! Top-level configuration structure and mode profile merging.
//!
//! For file discovery see [`crate::discovery`]; for layered loading see
//! [`crate::loader`].

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bundle::{
    CopyPattern, HtmlOptions, ModuleOptions, OptimizationOptions, OutputOptions, ResolveOptions,
};
use crate::defaults::default_context;
use crate::dev::DevServerConfig;
use crate::error::{ConfigError, Result as ConfigResult};
use crate::mode::Mode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WispConfig {
    #[serde(default)]
    pub mode: Mode,

    /// Project root. Relative paths elsewhere in the configuration resolve
    /// against it.
    #[serde(default = "default_context")]
    pub context: PathBuf,

    /// Entry point name → path, in declaration order.
    #[serde(default)]
    pub entry: IndexMap<String, PathBuf>,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub module: ModuleOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub optimization: OptimizationOptions,

    /// Specifier → global variable. Matching imports are not bundled.
    #[serde(default)]
    pub externals: IndexMap<String, String>,

    /// Expression → replacement text, applied by the downlevel stage.
    /// `process.env.NODE_ENV` is always defined from the mode.
    #[serde(default)]
    pub define: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlOptions>,

    #[serde(default)]
    pub copy: Vec<CopyPattern>,

    #[serde(default)]
    pub dev_server: DevServerConfig,

    /// Per-mode overrides, deep-merged over the base configuration.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub profiles: IndexMap<String, Value>,
}

impl Default for WispConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            context: default_context(),
            entry: IndexMap::new(),
            output: OutputOptions::default(),
            module: ModuleOptions::default(),
            resolve: ResolveOptions::default(),
            optimization: OptimizationOptions::default(),
            externals: IndexMap::new(),
            define: IndexMap::new(),
            html: None,
            copy: Vec::new(),
            dev_server: DevServerConfig::default(),
            profiles: IndexMap::new(),
        }
    }
}

impl WispConfig {
    /// Create from a JSON value (programmatic configuration).
    ///
    /// ```
    /// use wisp_config::WispConfig;
    /// use serde_json::json;
    ///
    /// let config = WispConfig::from_value(json!({
    ///     "entry": { "main": "./src/app.js" }
    /// })).unwrap();
    /// assert_eq!(config.entry.len(), 1);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| {
            ConfigError::invalid("config", e.to_string(), "Check field names and types")
        })
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| {
            ConfigError::invalid("config", e.to_string(), "Configuration is not serializable")
        })
    }

    /// Merge the profile named after `mode` (if any) over this configuration.
    ///
    /// The profile itself cannot change the mode.
    pub fn materialize_profile(self, mode: Mode) -> ConfigResult<Self> {
        let Some(profile) = self.profiles.get(mode.as_str()).cloned() else {
            return Ok(self);
        };
        if profile.is_null() {
            return Ok(self);
        }

        let profiles = self.profiles.clone();
        let mut base = serde_json::to_value(&self).map_err(|err| {
            ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            }
        })?;
        merge_values(&mut base, &profile);

        let mut merged: WispConfig =
            serde_json::from_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
                message: format!("profile '{mode}': {err}"),
            })?;
        merged.mode = mode;
        merged.profiles = profiles;
        Ok(merged)
    }

    /// Resolve a configured path against the project context.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.context.join(path)
        }
    }

    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.output.path)
    }

    /// `define` entries plus the mode-derived `process.env.NODE_ENV`.
    pub fn defines(&self) -> IndexMap<String, String> {
        let mut defines = IndexMap::with_capacity(self.define.len() + 1);
        defines.insert(
            "process.env.NODE_ENV".to_string(),
            format!("\"{}\"", self.mode.as_str()),
        );
        for (key, value) in &self.define {
            defines.insert(key.clone(), value.clone());
        }
        defines
    }
}

/// Deep-merge `update` into `target`. Objects merge key by key; every other
/// value (arrays included) replaces the target wholesale.
pub fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_rejects_unknown_fields() {
        let result = WispConfig::from_value(json!({ "entries": {} }));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn entry_order_is_preserved() {
        let config = WispConfig::from_value(json!({
            "entry": { "main": "./src/app.js", "result": "./src/result.js" }
        }))
        .unwrap();
        let names: Vec<_> = config.entry.keys().cloned().collect();
        assert_eq!(names, vec!["main", "result"]);
    }

    #[test]
    fn production_profile_merges_nested_values() {
        let config = WispConfig::from_value(json!({
            "html": { "parameters": { "env": "(dev)" } },
            "profiles": {
                "production": { "html": { "parameters": { "env": "" } } }
            }
        }))
        .unwrap()
        .materialize_profile(Mode::Production)
        .unwrap();

        assert_eq!(config.mode, Mode::Production);
        let html = config.html.unwrap();
        assert_eq!(html.parameters["env"], json!(""));
    }

    #[test]
    fn defines_include_node_env() {
        let config = WispConfig {
            mode: Mode::Production,
            ..Default::default()
        };
        assert_eq!(config.defines()["process.env.NODE_ENV"], "\"production\"");
    }

    #[test]
    fn merge_replaces_arrays() {
        let mut base = json!({ "copy": [{ "from": "a", "to": "b" }] });
        merge_values(&mut base, &json!({ "copy": [] }));
        assert_eq!(base, json!({ "copy": [] }));
    }
}
