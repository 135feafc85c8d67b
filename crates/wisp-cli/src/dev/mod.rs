//! Development server.
//!
//! - in-memory build output with an ordered request chain (middleware,
//!   static files, mocks, proxy, SPA fallback)
//! - an HMR channel over Server-Sent Events
//! - file watching with debouncing and cancellable incremental rebuilds
//! - an error overlay while the last build is broken

pub mod builder;
pub mod config;
pub mod error_overlay;
pub mod middleware;
pub mod mocks;
pub mod proxy;
pub mod server;
pub mod state;
pub mod watcher;

pub use builder::DevBuilder;
pub use config::DevConfig;
pub use middleware::{Middleware, MiddlewareChain, Request};
pub use mocks::MockTable;
pub use proxy::{ProxyTable, ProxyUpstreamError};
pub use server::DevServer;
pub use state::{BuildStatus, DevServerState, SharedState};
pub use watcher::FileWatcher;

use serde::Serialize;
use wisp_bundler::HmrBatch;

/// Path prefix reserved for the server's own routes.
pub const INTERNAL_PREFIX: &str = "/__wisp";
/// URL of the browser HMR client, injected into the HTML document.
pub const CLIENT_SCRIPT: &str = "/__wisp/client.js";

/// Messages pushed to browsers over the HMR channel.
///
/// Serialized as JSON objects tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DevEvent {
    /// First message on every connection.
    Connected { version: u64 },
    /// A rebuild cycle started.
    BuildStarted { cycle: u64 },
    /// The atomic update set of a successful cycle.
    Update(HmrBatch),
    /// The cycle failed; the overlay shows these messages.
    BuildFailed { errors: Vec<String> },
    /// Something changed that cannot be patched in place.
    FullReload { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_are_tagged() {
        let event = DevEvent::BuildFailed {
            errors: vec!["boom".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "buildFailed", "errors": ["boom"] })
        );
        assert_eq!(
            serde_json::to_value(DevEvent::FullReload {
                reason: "html".to_string()
            })
            .unwrap()["type"],
            "fullReload"
        );
    }

    #[test]
    fn test_update_flattens_the_batch() {
        let batch = HmrBatch {
            cycle: 3,
            version: 7,
            full_reload: false,
            updates: Vec::new(),
            styles: Vec::new(),
        };
        let value = serde_json::to_value(DevEvent::Update(batch)).unwrap();
        assert_eq!(value["type"], "update");
        assert_eq!(value["cycle"], 3);
        assert_eq!(value["fullReload"], false);
    }
}
