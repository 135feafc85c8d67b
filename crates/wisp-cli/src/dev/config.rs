//! Development server configuration.
//!
//! Derives everything the server, watcher and rebuild loop need from the
//! resolved `WispConfig`.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wisp_config::{ConfigError, DevServerConfig, WispConfig};

use crate::error::{CliError, Result};
use crate::ui;

/// How many ports above the requested one are tried when it is busy.
const PORT_ATTEMPTS: u16 = 10;

#[derive(Debug, Clone)]
pub struct DevConfig {
    pub config: Arc<WispConfig>,

    /// Directory watched for changes; the project context.
    pub watch_root: PathBuf,

    /// Ignore patterns for the watcher, relative to `watch_root`.
    pub watch_ignore: Vec<String>,

    /// Debounce window for coalescing file events.
    pub debounce: Duration,
}

impl DevConfig {
    pub fn new(config: Arc<WispConfig>) -> Self {
        let server = &config.dev_server;
        let mut watch_ignore = vec!["node_modules".to_string(), ".git".to_string()];
        if let Ok(out) = config.out_dir().strip_prefix(&config.context) {
            let out = out.to_string_lossy().replace('\\', "/");
            if !out.is_empty() {
                watch_ignore.push(out);
            }
        }
        watch_ignore.extend(server.watch_ignore.iter().cloned());

        Self {
            watch_root: config.context.clone(),
            debounce: Duration::from_millis(server.debounce_ms),
            watch_ignore,
            config,
        }
    }

    pub fn server(&self) -> &DevServerConfig {
        &self.config.dev_server
    }

    pub fn hot(&self) -> bool {
        self.server().hot
    }

    /// Bind the configured host and port, trying the next ports up when the
    /// requested one is taken.
    pub fn bind(&self) -> Result<TcpListener> {
        bind_available(&self.server().host, self.server().port)
    }
}

/// Bind `host:port`, or the first free port among the next ten.
pub fn bind_available(host: &str, port: u16) -> Result<TcpListener> {
    if port != 0 && port < 1024 {
        ui::warning(&format!(
            "Port {port} is in privileged range, may require root access"
        ));
    }

    for offset in 0..=PORT_ATTEMPTS {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        let addr = resolve(host, candidate)?;
        match TcpListener::bind(addr) {
            Ok(listener) => {
                if offset > 0 {
                    ui::warning(&format!("Port {port} is busy, using port {candidate} instead"));
                }
                listener.set_nonblocking(true)?;
                return Ok(listener);
            }
            Err(e) => tracing::debug!(%addr, error = %e, "port unavailable"),
        }
    }

    Err(ConfigError::InvalidValue {
        field: "devServer.port".to_string(),
        value: port.to_string(),
        hint: format!(
            "Ports {}-{} are all in use. Try a different port.",
            port,
            port.saturating_add(PORT_ATTEMPTS)
        ),
    }
    .into())
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| CliError::Server(format!("cannot resolve host '{host}': {e}")))?
        .next()
        .ok_or_else(|| CliError::Server(format!("host '{host}' has no addresses")))
}

/// The URL printed for the user.
pub fn server_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_busy_port_falls_through_to_next() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        match bind_available("127.0.0.1", port) {
            Ok(listener) => assert_ne!(listener.local_addr().unwrap().port(), port),
            // All ten neighbours can be taken on a busy machine.
            Err(err) => assert!(matches!(err, CliError::Config(_))),
        }
    }

    #[test]
    fn test_unresolvable_host() {
        assert!(matches!(
            bind_available("host.invalid.", 3000),
            Err(CliError::Server(_))
        ));
    }

    #[test]
    fn test_server_url() {
        assert_eq!(
            server_url("127.0.0.1:3000".parse().unwrap()),
            "http://127.0.0.1:3000"
        );
        assert_eq!(server_url("0.0.0.0:8080".parse().unwrap()), "http://localhost:8080");
    }

    #[test]
    fn test_watch_ignores_output_directory() {
        let config = WispConfig::from_value(json!({
            "context": "/app",
            "entry": { "main": "./index.js" },
            "output": { "path": "build/web" },
            "devServer": { "watchIgnore": ["*.log"], "debounceMs": 250 }
        }))
        .unwrap();
        let dev = DevConfig::new(Arc::new(config));
        assert_eq!(dev.watch_ignore, ["node_modules", ".git", "build/web", "*.log"]);
        assert_eq!(dev.debounce, Duration::from_millis(250));
        assert_eq!(dev.watch_root, PathBuf::from("/app"));
    }
}
