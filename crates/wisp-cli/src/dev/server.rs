//! Development server.
//!
//! Serves build output from memory and pushes HMR events over Server-Sent
//! Events. Every request outside `/__wisp` walks one ordered chain:
//!
//! 1. `front` middleware
//! 2. the error overlay, for browser navigations while the build is broken
//! 3. build output
//! 4. the static directory
//! 5. `default` middleware
//! 6. mocks
//! 7. the proxy
//! 8. the history API fallback
//! 9. `back` middleware
//!
//! and gets a 404 when nothing answers.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use wisp_config::MiddlewarePosition;

use crate::dev::{
    DevConfig, DevEvent, INTERNAL_PREFIX, Middleware, MiddlewareChain, MockTable, ProxyTable,
    Request, SharedState, error_overlay,
};
use crate::error::{CliError, Result};

const HMR_CLIENT: &str = include_str!("../../assets/dev/hmr-client.js");

/// Largest request body the chain buffers.
const MAX_BODY: usize = 16 * 1024 * 1024;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Development server.
pub struct DevServer {
    config: DevConfig,
    state: SharedState,
    chain: MiddlewareChain,
    mocks: MockTable,
    proxy: ProxyTable,
}

impl DevServer {
    /// Build the request chain from configuration. Fails on invalid
    /// middleware, mock or proxy settings.
    pub fn new(config: DevConfig, state: SharedState) -> Result<Self> {
        let server = config.server();
        let chain = MiddlewareChain::from_config(&server.middleware)?;
        let mocks = MockTable::from_config(&config.config)?;
        let proxy = ProxyTable::from_config(server)?;
        Ok(Self {
            config,
            state,
            chain,
            mocks,
            proxy,
        })
    }

    /// Mount a handler in addition to the configured middleware.
    pub fn with_middleware(
        mut self,
        position: MiddlewarePosition,
        path: Option<String>,
        handler: Arc<dyn Middleware>,
    ) -> Self {
        self.chain.push(position, path, handler);
        self
    }

    pub fn router(&self) -> Router {
        let server = self.config.server();
        let context = Arc::new(ServerContext {
            state: Arc::clone(&self.state),
            chain: self.chain.clone(),
            mocks: self.mocks.clone(),
            proxy: self.proxy.clone(),
            static_dir: server
                .static_dir
                .as_ref()
                .map(|dir| self.config.config.resolve_path(dir)),
            history_index: server.history_api_fallback.as_ref().map(|h| h.index.clone()),
            overlay: server.overlay,
        });

        Router::new()
            .route(&format!("{INTERNAL_PREFIX}/hmr"), get(handle_hmr))
            .route(&format!("{INTERNAL_PREFIX}/ack"), post(handle_ack))
            .route(&format!("{INTERNAL_PREFIX}/client.js"), get(handle_client_script))
            .route(&format!("{INTERNAL_PREFIX}/status"), get(handle_status))
            .fallback(handle_request)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(context)
    }

    /// Serve on `listener` until the task is dropped.
    pub async fn serve(self, listener: std::net::TcpListener) -> Result<()> {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        axum::serve(listener, self.router())
            .await
            .map_err(|e| CliError::Server(format!("server error: {e}")))
    }
}

struct ServerContext {
    state: SharedState,
    chain: MiddlewareChain,
    mocks: MockTable,
    proxy: ProxyTable,
    static_dir: Option<PathBuf>,
    history_index: Option<String>,
    overlay: bool,
}

type Context = Arc<ServerContext>;

impl ServerContext {
    async fn respond(&self, request: &Request) -> Response {
        if let Some(response) = self.chain.run(MiddlewarePosition::Front, request) {
            return response;
        }
        if request.wants_html() && request.is_navigation() {
            if let Some(response) = self.overlay_response() {
                return response;
            }
        }
        if let Some(response) = self.serve_artifact(request) {
            return response;
        }
        if let Some(response) = self.serve_static(request).await {
            return response;
        }
        if let Some(response) = self.chain.run(MiddlewarePosition::Default, request) {
            return response;
        }
        if let Some(response) = self.mocks.respond(request).await {
            return response;
        }
        if let Some(response) = self.proxy.forward(request).await {
            return response;
        }
        if let Some(response) = self.history_fallback(request) {
            return response;
        }
        if let Some(response) = self.chain.run(MiddlewarePosition::Back, request) {
            return response;
        }
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Not found: {}", request.path()),
        )
            .into_response()
    }

    fn serve_artifact(&self, request: &Request) -> Option<Response> {
        if !request.is_read() {
            return None;
        }
        let path = request.path();
        let name = if path.ends_with('/') {
            format!("{path}index.html")
        } else {
            path.to_string()
        };
        let artifacts = self.state.artifacts();
        let content = artifacts.get(&name)?;
        Some(file_response(&name, content.to_vec()))
    }

    async fn serve_static(&self, request: &Request) -> Option<Response> {
        let dir = self.static_dir.as_ref()?;
        if !request.is_read() {
            return None;
        }
        let mut inner = axum::http::Request::new(Body::empty());
        *inner.method_mut() = request.method.clone();
        *inner.uri_mut() = request.uri.clone();
        *inner.headers_mut() = request.headers.clone();

        let response = match ServeDir::new(dir)
            .append_index_html_on_directories(false)
            .oneshot(inner)
            .await
        {
            Ok(response) => response,
            Err(never) => match never {},
        };
        if response.status() == StatusCode::NOT_FOUND {
            return None;
        }
        Some(response.map(Body::new))
    }

    fn history_fallback(&self, request: &Request) -> Option<Response> {
        if !request.is_navigation() || !request.accepts_html() {
            return None;
        }
        if let Some(response) = self.overlay_response() {
            return Some(response);
        }
        let index = self.history_index.as_deref()?;
        let artifacts = self.state.artifacts();
        let content = artifacts.get(index)?;
        tracing::debug!(path = request.path(), index, "history fallback");
        Some(file_response(index, content.to_vec()))
    }

    /// The overlay, when enabled and the last build failed.
    fn overlay_response(&self) -> Option<Response> {
        if !self.overlay {
            return None;
        }
        let errors = self.state.failure()?;
        let response = match error_overlay::render(&errors) {
            Ok(html) => (
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                html,
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render error overlay: {e}"),
            )
                .into_response(),
        };
        Some(response)
    }
}

fn file_response(name: &str, content: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type_for(name)),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        content,
    )
        .into_response()
}

/// Content type for a file name, by extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" | "cjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

async fn handle_request(State(context): State<Context>, request: axum::extract::Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(body) => body,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, format!("request body rejected: {e}"))
                .into_response();
        }
    };
    let request = Request::from_parts(parts, body);
    context.respond(&request).await
}

/// Unregisters the client when its event stream is dropped.
struct ClientGuard {
    state: SharedState,
    id: usize,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.state.unregister_client(self.id);
        tracing::debug!(client = self.id, "client disconnected");
    }
}

async fn handle_hmr(
    State(context): State<Context>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let state = Arc::clone(&context.state);
    let (id, rx) = state.register_client();
    tracing::debug!(client = id, "client connected");

    let connected = Event::default()
        .json_data(DevEvent::Connected {
            version: state.version(),
        })
        .ok()
        .map(Ok::<_, Infallible>);
    let guard = ClientGuard { state, id };
    let events = ReceiverStream::new(rx).map(move |data| {
        let _guard = &guard;
        Ok::<_, Infallible>(Event::default().data(data))
    });

    Sse::new(tokio_stream::iter(connected).chain(events))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

#[derive(Deserialize)]
struct Ack {
    cycle: u64,
}

async fn handle_ack(State(context): State<Context>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<Ack>(&body) {
        Ok(ack) => context.state.acknowledge(ack.cycle),
        Err(e) => tracing::debug!(error = %e, "ignoring malformed ack"),
    }
    StatusCode::NO_CONTENT
}

async fn handle_client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        HMR_CLIENT,
    )
}

async fn handle_status(State(context): State<Context>) -> impl IntoResponse {
    Json(context.state.report())
}
