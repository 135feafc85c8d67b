//! Development server configuration types.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults::{
    default_debounce_ms, default_fallback_index, default_host, default_method, default_port,
    default_static_dir, default_status, default_true,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Push module updates to connected clients.
    #[serde(default = "default_true")]
    pub hot: bool,

    /// Show build failures in the browser.
    #[serde(default = "default_true")]
    pub overlay: bool,

    /// Extra directory served after the in-memory build output.
    #[serde(
        rename = "static",
        default = "default_static_dir",
        skip_serializing_if = "Option::is_none"
    )]
    pub static_dir: Option<PathBuf>,

    #[serde(default = "default_history_fallback", skip_serializing_if = "Option::is_none")]
    pub history_api_fallback: Option<HistoryApiFallback>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Path prefix → upstream.
    #[serde(default)]
    pub proxy: IndexMap<String, ProxyTarget>,

    #[serde(default)]
    pub mocks: Vec<MockRoute>,

    #[serde(default)]
    pub mock_dirs: Vec<MockDir>,

    #[serde(default)]
    pub middleware: Vec<MiddlewareSpec>,

    /// Extra watcher ignore patterns (`*.ext` or directory names).
    #[serde(default)]
    pub watch_ignore: Vec<String>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            hot: true,
            overlay: true,
            static_dir: default_static_dir(),
            history_api_fallback: default_history_fallback(),
            debounce_ms: default_debounce_ms(),
            proxy: IndexMap::new(),
            mocks: Vec::new(),
            mock_dirs: Vec::new(),
            middleware: Vec::new(),
            watch_ignore: Vec::new(),
        }
    }
}

fn default_history_fallback() -> Option<HistoryApiFallback> {
    Some(HistoryApiFallback::default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HistoryApiFallback {
    /// Document returned for unmatched navigable requests, relative to the
    /// output directory.
    #[serde(default = "default_fallback_index")]
    pub index: String,
}

impl Default for HistoryApiFallback {
    fn default() -> Self {
        Self {
            index: default_fallback_index(),
        }
    }
}

/// Either `"/api": "http://host"` or the long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyTarget {
    Url(String),
    Rule(ProxyRule),
}

impl ProxyTarget {
    pub fn into_rule(self) -> ProxyRule {
        match self {
            Self::Url(target) => ProxyRule {
                target,
                change_origin: false,
                path_rewrite: IndexMap::new(),
            },
            Self::Rule(rule) => rule,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Url(target) => target,
            Self::Rule(rule) => &rule.target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProxyRule {
    /// Upstream base URL.
    pub target: String,

    /// Rewrite the `Host` header to the upstream's authority.
    #[serde(default)]
    pub change_origin: bool,

    /// Leading path segment replacements applied before forwarding.
    #[serde(default)]
    pub path_rewrite: IndexMap<String, String>,
}

/// A locally served stand-in response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockRoute {
    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Read on every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl MockRoute {
    pub fn json(method: &str, path: &str, value: Value) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status: default_status(),
            json: Some(value),
            body: None,
            file: None,
            content_type: None,
        }
    }

    /// Number of response sources set; exactly one is valid.
    pub fn response_sources(&self) -> usize {
        [self.json.is_some(), self.body.is_some(), self.file.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count()
    }
}

/// Maps `METHOD <prefix>/a/b` to `<dir>/a/b/METHOD.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MockDir {
    pub prefix: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiddlewarePosition {
    /// Before every built-in handler.
    Front,
    /// After static output, before mocks and proxying.
    Default,
    /// After the SPA fallback declined the request.
    #[default]
    Back,
}

/// A statically configured middleware entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MiddlewareSpec {
    pub name: String,

    /// Matches this path and its sub-paths; absent matches every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub position: MiddlewarePosition,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default)]
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proxy_accepts_short_and_long_forms() {
        let config: DevServerConfig = serde_json::from_value(json!({
            "proxy": {
                "/api": "http://localhost:3001",
                "/auth": { "target": "http://localhost:4000", "changeOrigin": true }
            }
        }))
        .unwrap();

        assert_eq!(config.proxy["/api"].target(), "http://localhost:3001");
        let auth = config.proxy["/auth"].clone().into_rule();
        assert!(auth.change_origin);
    }

    #[test]
    fn middleware_defaults_to_back() {
        let spec: MiddlewareSpec = serde_json::from_value(json!({
            "name": "hello",
            "body": "Hello World!"
        }))
        .unwrap();
        assert_eq!(spec.position, MiddlewarePosition::Back);
        assert_eq!(spec.status, 200);
        assert!(spec.path.is_none());
    }

    #[test]
    fn mock_counts_response_sources() {
        let mock = MockRoute::json("GET", "/api/user", json!([]));
        assert_eq!(mock.response_sources(), 1);
    }
}
