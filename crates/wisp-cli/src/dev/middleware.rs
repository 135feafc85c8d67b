//! Custom request handlers mounted before (`front`), between (`default`) or
//! after (`back`) the built-in handlers.
//!
//! Configuration can only declare static responses; code embedding the
//! server can mount anything implementing [`Middleware`].

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header, request::Parts};
use axum::response::{IntoResponse, Response};
use wisp_config::{MiddlewarePosition, MiddlewareSpec};

use crate::error::{CliError, Result};

/// A request as the chain sees it: the head plus the fully read body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub(crate) fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// GET or HEAD.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Whether the `Accept` header admits an HTML document. A missing header
    /// admits anything.
    pub fn accepts_html(&self) -> bool {
        let Some(accept) = self.headers.get(header::ACCEPT) else {
            return true;
        };
        let Ok(accept) = accept.to_str() else {
            return false;
        };
        accept.split(',').any(|item| {
            let media = item.split(';').next().unwrap_or("").trim();
            matches!(media, "text/html" | "text/*" | "*/*")
        })
    }

    /// Whether the client explicitly asks for HTML, as browsers do when
    /// navigating.
    pub fn wants_html(&self) -> bool {
        self.headers
            .get(header::ACCEPT)
            .and_then(|accept| accept.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
    }

    /// GET or HEAD for a path whose last segment has no extension.
    pub fn is_navigation(&self) -> bool {
        let last = self.path().rsplit('/').next().unwrap_or("");
        self.is_read() && !last.contains('.')
    }
}

/// A request handler in the chain.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Respond, or return `None` to pass the request on.
    fn handle(&self, request: &Request) -> Option<Response>;
}

/// A fixed response declared in configuration.
#[derive(Debug, Clone)]
pub struct StaticResponse {
    name: String,
    status: StatusCode,
    content_type: HeaderValue,
    body: Bytes,
}

impl StaticResponse {
    pub fn from_spec(spec: &MiddlewareSpec) -> Result<Self> {
        let status = StatusCode::from_u16(spec.status).map_err(|_| {
            CliError::InvalidArgument(format!(
                "middleware '{}' has invalid status {}",
                spec.name, spec.status
            ))
        })?;
        let content_type = spec.content_type.as_deref().unwrap_or("text/plain; charset=utf-8");
        let content_type = HeaderValue::from_str(content_type).map_err(|_| {
            CliError::InvalidArgument(format!(
                "middleware '{}' has invalid content type '{content_type}'",
                spec.name
            ))
        })?;
        Ok(Self {
            name: spec.name.clone(),
            status,
            content_type,
            body: Bytes::from(spec.body.clone()),
        })
    }
}

impl Middleware for StaticResponse {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, _request: &Request) -> Option<Response> {
        Some(
            (
                self.status,
                [(header::CONTENT_TYPE, self.content_type.clone())],
                Body::from(self.body.clone()),
            )
                .into_response(),
        )
    }
}

#[derive(Clone)]
struct Mounted {
    path: Option<String>,
    handler: Arc<dyn Middleware>,
}

/// Whether `path` is `mount` or lies below it.
pub fn path_matches(mount: &str, path: &str) -> bool {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return true;
    }
    match path.strip_prefix(mount) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Middleware grouped by position, each group in registration order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    front: Vec<Mounted>,
    default: Vec<Mounted>,
    back: Vec<Mounted>,
}

impl MiddlewareChain {
    pub fn from_config(specs: &[MiddlewareSpec]) -> Result<Self> {
        let mut chain = Self::default();
        for spec in specs {
            let handler = Arc::new(StaticResponse::from_spec(spec)?);
            chain.push(spec.position, spec.path.clone(), handler);
        }
        Ok(chain)
    }

    /// Mount `handler` at `position`, for `path` and below or for every
    /// request when `path` is `None`.
    pub fn push(
        &mut self,
        position: MiddlewarePosition,
        path: Option<String>,
        handler: Arc<dyn Middleware>,
    ) {
        let mounted = Mounted { path, handler };
        match position {
            MiddlewarePosition::Front => self.front.push(mounted),
            MiddlewarePosition::Default => self.default.push(mounted),
            MiddlewarePosition::Back => self.back.push(mounted),
        }
    }

    /// First response from the handlers at `position` that match the path.
    pub fn run(&self, position: MiddlewarePosition, request: &Request) -> Option<Response> {
        let group = match position {
            MiddlewarePosition::Front => &self.front,
            MiddlewarePosition::Default => &self.default,
            MiddlewarePosition::Back => &self.back,
        };
        group
            .iter()
            .filter(|m| m.path.as_deref().is_none_or(|p| path_matches(p, request.path())))
            .find_map(|m| {
                let response = m.handler.handle(request);
                if response.is_some() {
                    tracing::debug!(middleware = m.handler.name(), path = request.path(), "handled");
                }
                response
            })
    }

    pub fn len(&self) -> usize {
        self.front.len() + self.default.len() + self.back.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |group: &[Mounted]| -> Vec<String> {
            group.iter().map(|m| m.handler.name().to_string()).collect()
        };
        f.debug_struct("MiddlewareChain")
            .field("front", &names(&self.front))
            .field("default", &names(&self.default))
            .field("back", &names(&self.back))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> MiddlewareSpec {
        serde_json::from_value(value).unwrap()
    }

    fn get(path: &str) -> Request {
        Request::new(Method::GET, path.parse().unwrap())
    }

    struct Echo;

    impl Middleware for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn handle(&self, request: &Request) -> Option<Response> {
            request
                .path()
                .ends_with("/echo")
                .then(|| request.path().to_string().into_response())
        }
    }

    #[test]
    fn test_mount_paths() {
        assert!(path_matches("/api", "/api"));
        assert!(path_matches("/api", "/api/users"));
        assert!(path_matches("/api/", "/api/users"));
        assert!(!path_matches("/api", "/apis"));
        assert!(path_matches("/", "/anything"));
    }

    #[test]
    fn test_positions_are_kept_apart() {
        let chain = MiddlewareChain::from_config(&[
            spec(json!({ "name": "early", "path": "/hello", "position": "front", "body": "front" })),
            spec(json!({ "name": "late", "body": "back", "status": 418 })),
        ])
        .unwrap();

        let front = chain.run(MiddlewarePosition::Front, &get("/hello/x")).unwrap();
        assert_eq!(front.status(), StatusCode::OK);
        assert!(chain.run(MiddlewarePosition::Front, &get("/other")).is_none());
        assert!(chain.run(MiddlewarePosition::Default, &get("/hello")).is_none());

        let back = chain.run(MiddlewarePosition::Back, &get("/other")).unwrap();
        assert_eq!(back.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_programmatic_handlers_may_pass() {
        let mut chain = MiddlewareChain::default();
        chain.push(MiddlewarePosition::Default, None, Arc::new(Echo));
        assert!(chain.run(MiddlewarePosition::Default, &get("/a/echo")).is_some());
        assert!(chain.run(MiddlewarePosition::Default, &get("/a")).is_none());
    }

    #[test]
    fn test_accept_header() {
        let mut request = get("/");
        assert!(request.accepts_html());
        request.headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9"),
        );
        assert!(request.accepts_html());
        request.headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!request.accepts_html());
        request.headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        assert!(request.accepts_html());
        assert!(!request.wants_html());
    }

    #[test]
    fn test_navigation_requests() {
        assert!(get("/").is_navigation());
        assert!(get("/users/42").is_navigation());
        assert!(!get("/main.js").is_navigation());
        assert!(!Request::new(Method::POST, "/users".parse().unwrap()).is_navigation());
    }

    #[test]
    fn test_invalid_content_type_is_rejected() {
        let err = MiddlewareChain::from_config(&[spec(json!({
            "name": "bad",
            "contentType": "text/plain\n",
            "body": ""
        }))])
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
