//! Locally served stand-in API responses.
//!
//! Mocks run before the proxy, so a mocked route answers even when its
//! prefix is proxied to a real backend.

use std::path::{Component, Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use wisp_config::{MockRoute, WispConfig};

use crate::dev::middleware::{Request, path_matches};
use crate::dev::server::content_type_for;
use crate::error::{CliError, Result};

const JSON: &str = "application/json";

#[derive(Debug, Clone)]
enum MockBody {
    Json(Bytes),
    Text(Bytes),
    /// Re-read on every request.
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct MockEntry {
    method: Method,
    path: String,
    status: StatusCode,
    content_type: Option<String>,
    body: MockBody,
}

impl MockEntry {
    fn from_route(config: &WispConfig, route: &MockRoute) -> Result<Self> {
        let invalid = |what: &str| {
            CliError::InvalidArgument(format!("mock {} {}: {what}", route.method, route.path))
        };
        let method = Method::from_bytes(route.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| invalid("invalid method"))?;
        let status = StatusCode::from_u16(route.status).map_err(|_| invalid("invalid status"))?;
        let body = match (&route.json, &route.body, &route.file) {
            (Some(value), _, _) => MockBody::Json(Bytes::from(serde_json::to_vec(value)?)),
            (None, Some(text), _) => MockBody::Text(Bytes::from(text.clone())),
            (None, None, Some(file)) => MockBody::File(config.resolve_path(file)),
            (None, None, None) => return Err(invalid("no response body configured")),
        };
        Ok(Self {
            method,
            path: route.path.clone(),
            status,
            content_type: route.content_type.clone(),
            body,
        })
    }

    fn matches(&self, request: &Request) -> bool {
        let method = request.method == self.method
            || (request.method == Method::HEAD && self.method == Method::GET);
        method && request.path() == self.path
    }

    async fn respond(&self) -> Response {
        let (default_type, body) = match &self.body {
            MockBody::Json(bytes) => (JSON, bytes.clone()),
            MockBody::Text(bytes) => ("text/plain; charset=utf-8", bytes.clone()),
            MockBody::File(path) => match tokio::fs::read(path).await {
                Ok(content) => (content_type_for(&path.to_string_lossy()), Bytes::from(content)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "mock file unreadable");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("mock file {} is unreadable: {e}", path.display()),
                    )
                        .into_response();
                }
            },
        };
        let content_type = self
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
            .unwrap_or(HeaderValue::from_static(default_type));
        (self.status, [(header::CONTENT_TYPE, content_type)], Body::from(body)).into_response()
    }
}

/// Inline mock routes plus directory-backed mocks.
#[derive(Debug, Clone, Default)]
pub struct MockTable {
    routes: Vec<MockEntry>,
    dirs: Vec<(String, PathBuf)>,
}

impl MockTable {
    pub fn from_config(config: &WispConfig) -> Result<Self> {
        let server = &config.dev_server;
        let routes = server
            .mocks
            .iter()
            .map(|route| MockEntry::from_route(config, route))
            .collect::<Result<Vec<_>>>()?;
        let dirs = server
            .mock_dirs
            .iter()
            .map(|dir| (dir.prefix.clone(), config.resolve_path(&dir.dir)))
            .collect();
        Ok(Self { routes, dirs })
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.dirs.is_empty()
    }

    /// The mocked response for `request`, if any route or directory has one.
    pub async fn respond(&self, request: &Request) -> Option<Response> {
        if let Some(entry) = self.routes.iter().find(|entry| entry.matches(request)) {
            tracing::debug!(method = %request.method, path = request.path(), "mocked");
            return Some(entry.respond().await);
        }
        for (prefix, dir) in &self.dirs {
            if !path_matches(prefix, request.path()) {
                continue;
            }
            let Some(file) = mock_file(dir, prefix, request) else {
                continue;
            };
            match tokio::fs::read(&file).await {
                Ok(content) => {
                    tracing::debug!(file = %file.display(), "mocked from directory");
                    return Some(
                        ([(header::CONTENT_TYPE, JSON)], Body::from(content)).into_response(),
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "mock file unreadable");
                    continue;
                }
            }
        }
        None
    }
}

/// `<dir>/<rest of path>/<METHOD>.json` for a request below `prefix`.
/// Paths that would leave `dir` yield `None`.
fn mock_file(dir: &Path, prefix: &str, request: &Request) -> Option<PathBuf> {
    let rest = request
        .path()
        .strip_prefix(prefix.trim_end_matches('/'))?
        .trim_matches('/');
    let mut file = dir.to_path_buf();
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(part) if !part.to_string_lossy().contains('\\') => file.push(part),
            _ => return None,
        }
    }
    let method = if request.method == Method::HEAD {
        "GET".to_string()
    } else {
        request.method.as_str().to_ascii_uppercase()
    };
    file.push(format!("{method}.json"));
    Some(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    fn table(root: &Path, dev_server: serde_json::Value) -> MockTable {
        let config = WispConfig::from_value(json!({
            "context": root,
            "entry": { "main": "./index.js" },
            "devServer": dev_server
        }))
        .unwrap();
        MockTable::from_config(&config).unwrap()
    }

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, path.parse().unwrap())
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_inline_json_mock() {
        let mocks = table(
            Path::new("/app"),
            json!({ "mocks": [{ "path": "/api/user", "json": [{ "id": 1 }] }] }),
        );
        let response = mocks.respond(&request(Method::GET, "/api/user")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(body(response).await, r#"[{"id":1}]"#);

        assert!(mocks.respond(&request(Method::POST, "/api/user")).await.is_none());
        assert!(mocks.respond(&request(Method::HEAD, "/api/user")).await.is_some());
        assert!(mocks.respond(&request(Method::GET, "/api/user/1")).await.is_none());
    }

    #[tokio::test]
    async fn test_file_mock_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.json"), r#"{"v":1}"#).unwrap();
        let mocks = table(
            dir.path(),
            json!({ "mocks": [{ "method": "post", "path": "/login", "status": 201, "file": "user.json" }] }),
        );

        let first = mocks.respond(&request(Method::POST, "/login")).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(body(first).await, r#"{"v":1}"#);

        std::fs::write(dir.path().join("user.json"), r#"{"v":2}"#).unwrap();
        let second = mocks.respond(&request(Method::POST, "/login")).await.unwrap();
        assert_eq!(body(second).await, r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn test_mock_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mocks/users")).unwrap();
        std::fs::write(dir.path().join("mocks/users/GET.json"), "[]").unwrap();
        let mocks = table(
            dir.path(),
            json!({ "mockDirs": [{ "prefix": "/api", "dir": "mocks" }] }),
        );

        let response = mocks.respond(&request(Method::GET, "/api/users")).await.unwrap();
        assert_eq!(body(response).await, "[]");
        assert!(mocks.respond(&request(Method::DELETE, "/api/users")).await.is_none());
        assert!(mocks.respond(&request(Method::GET, "/api/other")).await.is_none());
    }

    #[test]
    fn test_mock_files_stay_inside_their_directory() {
        let dir = Path::new("/m");
        let escape = request(Method::GET, "/api/../secret");
        assert!(mock_file(dir, "/api", &escape).is_none());
        assert_eq!(
            mock_file(dir, "/api", &request(Method::HEAD, "/api/a/b")),
            Some(PathBuf::from("/m/a/b/GET.json"))
        );
        assert_eq!(
            mock_file(dir, "/api/", &request(Method::PUT, "/api")),
            Some(PathBuf::from("/m/PUT.json"))
        );
    }
}
