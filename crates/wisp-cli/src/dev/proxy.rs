//! Forwarding of API prefixes to real backends.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex::Regex;
use thiserror::Error;
use wisp_config::{ConfigError, DevServerConfig};

use crate::dev::middleware::{Request, path_matches};
use crate::error::{CliError, Result};

/// Connection-scoped headers that must not cross a proxy.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// The upstream could not be reached or did not answer.
///
/// Relayed to the browser as `502 Bad Gateway`; the server keeps running.
#[derive(Debug, Error)]
#[error("proxy upstream {target} failed: {message}")]
pub struct ProxyUpstreamError {
    pub target: String,
    pub message: String,
}

impl IntoResponse for ProxyUpstreamError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Bad Gateway: upstream {} is unreachable ({})\n", self.target, self.message),
        )
            .into_response()
    }
}

#[derive(Debug, Clone)]
struct ProxyRoute {
    prefix: String,
    target: String,
    change_origin: bool,
    rewrites: Vec<(Regex, String)>,
}

impl ProxyRoute {
    fn upstream_url(&self, request: &Request) -> String {
        let mut path = request.path().to_string();
        for (pattern, replacement) in &self.rewrites {
            path = pattern.replace(&path, replacement.as_str()).into_owned();
        }
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        match request.uri.query() {
            Some(query) => format!("{}{}?{}", self.target, path, query),
            None => format!("{}{}", self.target, path),
        }
    }
}

/// Proxy rules in configuration order; the first matching prefix wins.
#[derive(Debug, Clone)]
pub struct ProxyTable {
    routes: Vec<ProxyRoute>,
    client: reqwest::Client,
}

impl ProxyTable {
    pub fn from_config(server: &DevServerConfig) -> Result<Self> {
        let mut routes = Vec::with_capacity(server.proxy.len());
        for (prefix, target) in &server.proxy {
            let rule = target.clone().into_rule();
            let mut rewrites = Vec::with_capacity(rule.path_rewrite.len());
            for (pattern, replacement) in &rule.path_rewrite {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    field: format!("devServer.proxy.{prefix}.pathRewrite"),
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                rewrites.push((regex, replacement.clone()));
            }
            routes.push(ProxyRoute {
                prefix: prefix.clone(),
                target: rule.target.trim_end_matches('/').to_string(),
                change_origin: rule.change_origin,
                rewrites,
            });
        }

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CliError::Server(format!("failed to create proxy client: {e}")))?;
        Ok(Self { routes, client })
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Forward `request` when its path is proxied. `None` when no prefix
    /// matches.
    pub async fn forward(&self, request: &Request) -> Option<Response> {
        let route = self
            .routes
            .iter()
            .find(|route| path_matches(&route.prefix, request.path()))?;
        match self.send(route, request).await {
            Ok(response) => Some(response),
            Err(err) => {
                tracing::warn!(upstream = %err.target, error = %err.message, "proxy upstream failed");
                Some(err.into_response())
            }
        }
    }

    async fn send(
        &self,
        route: &ProxyRoute,
        request: &Request,
    ) -> std::result::Result<Response, ProxyUpstreamError> {
        let url = route.upstream_url(request);
        tracing::debug!(method = %request.method, %url, "proxying");

        let mut headers = forwardable(&request.headers);
        headers.remove(header::CONTENT_LENGTH);
        if route.change_origin {
            headers.remove(header::HOST);
            headers.remove(header::ORIGIN);
        }

        let upstream = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| ProxyUpstreamError {
                target: route.target.clone(),
                message: e.to_string(),
            })?;

        let status = upstream.status();
        let headers = forwardable(upstream.headers());
        let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method};
    use serde_json::json;

    fn table(proxy: serde_json::Value) -> ProxyTable {
        let server: DevServerConfig = serde_json::from_value(json!({ "proxy": proxy })).unwrap();
        ProxyTable::from_config(&server).unwrap()
    }

    fn request(path: &str) -> Request {
        Request::new(Method::GET, path.parse().unwrap())
    }

    #[test]
    fn test_upstream_url_keeps_path_and_query() {
        let table = table(json!({ "/api": "http://localhost:3001/" }));
        let route = &table.routes[0];
        assert_eq!(
            route.upstream_url(&request("/api/users?page=2")),
            "http://localhost:3001/api/users?page=2"
        );
    }

    #[test]
    fn test_path_rewrite() {
        let table = table(json!({
            "/api": { "target": "http://backend:8080", "pathRewrite": { "^/api": "" } }
        }));
        let route = &table.routes[0];
        assert_eq!(route.upstream_url(&request("/api/users")), "http://backend:8080/users");
        assert_eq!(route.upstream_url(&request("/api")), "http://backend:8080/");
    }

    #[test]
    fn test_invalid_rewrite_is_a_config_error() {
        let server: DevServerConfig = serde_json::from_value(json!({
            "proxy": { "/api": { "target": "http://x", "pathRewrite": { "(": "" } } }
        }))
        .unwrap();
        assert!(matches!(
            ProxyTable::from_config(&server),
            Err(CliError::Config(ConfigError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn test_hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let out = forwardable(&headers);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_unmatched_paths_are_not_proxied() {
        let table = table(json!({ "/api": "http://127.0.0.1:9" }));
        assert!(table.forward(&request("/app.js")).await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_a_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let table = table(json!({ "/api": format!("http://127.0.0.1:{port}") }));
        let response = table.forward(&request("/api/users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
