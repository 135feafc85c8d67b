//! Shared state for the development server.
//!
//! Build status, the last good graph and output, and the SSE client
//! registry. Guarded with parking_lot locks; no lock is held across an
//! await.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use wisp_bundler::BuildArtifacts;
use wisp_graph::{ModuleGraph, SnapshotError, SnapshotStore};

use crate::dev::DevEvent;

/// Messages a client may have queued before it is considered stuck.
pub const CLIENT_QUEUE: usize = 64;

/// Build status tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64 },
    /// The last cycle failed. The previous good output keeps being served.
    Failed { errors: Vec<String> },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self, BuildStatus::NotStarted)
    }

    pub fn errors(&self) -> Option<&[String]> {
        match self {
            BuildStatus::Failed { errors } => Some(errors),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BuildStatus::NotStarted => "idle",
            BuildStatus::InProgress { .. } => "building",
            BuildStatus::Success { .. } => "ok",
            BuildStatus::Failed { .. } => "failed",
        }
    }
}

/// Body of `GET /__wisp/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub version: u64,
    pub cycle: u64,
    pub clients: usize,
    pub last_ack: u64,
    pub files: usize,
    pub errors: Vec<String>,
}

type ClientRegistry = RwLock<HashMap<usize, mpsc::Sender<String>>>;

pub struct DevServerState {
    status: RwLock<BuildStatus>,
    artifacts: RwLock<Arc<BuildArtifacts>>,
    snapshot: SnapshotStore,
    clients: ClientRegistry,
    next_client_id: AtomicUsize,
    cycle: AtomicU64,
    last_ack: AtomicU64,
}

/// Shared state handle.
pub type SharedState = Arc<DevServerState>;

impl DevServerState {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            artifacts: RwLock::new(Arc::new(BuildArtifacts::default())),
            snapshot: SnapshotStore::default(),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicUsize::new(0),
            cycle: AtomicU64::new(0),
            last_ack: AtomicU64::new(0),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
    }

    pub fn complete_build(&self, duration_ms: u64) {
        *self.status.write() = BuildStatus::Success { duration_ms };
    }

    pub fn fail_build(&self, errors: Vec<String>) {
        *self.status.write() = BuildStatus::Failed { errors };
    }

    pub fn status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    /// Errors of the last cycle, when it failed.
    pub fn failure(&self) -> Option<Vec<String>> {
        self.status.read().errors().map(<[String]>::to_vec)
    }

    /// Number the next rebuild cycle.
    pub fn next_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Output currently served. Readers keep a consistent set of files for
    /// as long as they hold the `Arc`.
    pub fn artifacts(&self) -> Arc<BuildArtifacts> {
        Arc::clone(&self.artifacts.read())
    }

    /// The last successfully built graph.
    pub fn snapshot(&self) -> Arc<ModuleGraph> {
        self.snapshot.load()
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Make a successful build visible: graph and output are swapped
    /// together. Rejected when a newer graph was already published.
    pub fn publish(
        &self,
        graph: ModuleGraph,
        artifacts: BuildArtifacts,
    ) -> Result<u64, SnapshotError> {
        let mut served = self.artifacts.write();
        let graph = self.snapshot.publish(graph)?;
        *served = Arc::new(artifacts);
        Ok(graph.version())
    }

    /// Register an SSE client. The receiver yields serialized events.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Queue `event` for every client without waiting. Clients whose queue
    /// is full or closed are dropped. Returns how many clients got it.
    pub fn broadcast(&self, event: &DevEvent) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize dev event");
                return 0;
            }
        };

        let mut dropped = Vec::new();
        let mut delivered = 0;
        for (id, tx) in self.clients.read().iter() {
            match tx.try_send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(client = id, "client is not keeping up, disconnecting");
                    dropped.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*id),
            }
        }

        if !dropped.is_empty() {
            let mut clients = self.clients.write();
            for id in dropped {
                clients.remove(&id);
            }
        }
        delivered
    }

    /// Record a client's acknowledgement of an applied cycle.
    pub fn acknowledge(&self, cycle: u64) {
        self.last_ack.fetch_max(cycle, Ordering::Relaxed);
    }

    pub fn last_ack(&self) -> u64 {
        self.last_ack.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> StatusReport {
        let status = self.status();
        StatusReport {
            status: status.label(),
            version: self.version(),
            cycle: self.cycle.load(Ordering::SeqCst),
            clients: self.client_count(),
            last_ack: self.last_ack(),
            files: self.artifacts().len(),
            errors: status.errors().map(<[String]>::to_vec).unwrap_or_default(),
        }
    }
}

impl Default for DevServerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_graph::{Module, ModuleId, ModuleKind};

    fn graph(version: u64) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        graph.add_module(
            Module::builder(ModuleId::new("/app/a.js").unwrap(), ModuleKind::Script).build(),
        );
        for _ in 0..version {
            graph.bump_version();
        }
        graph
    }

    fn artifacts(name: &str) -> BuildArtifacts {
        let mut artifacts = BuildArtifacts::default();
        artifacts.insert(name.to_string(), b"x".to_vec());
        artifacts
    }

    #[test]
    fn test_build_lifecycle() {
        let state = DevServerState::new();
        assert!(state.status().is_not_started());

        state.start_build();
        assert!(state.status().is_in_progress());

        state.fail_build(vec!["bad".to_string()]);
        assert_eq!(state.failure(), Some(vec!["bad".to_string()]));

        state.complete_build(12);
        assert!(state.status().is_success());
        assert!(state.failure().is_none());
    }

    #[test]
    fn test_publish_swaps_graph_and_output_together() {
        let state = DevServerState::new();
        assert_eq!(state.publish(graph(2), artifacts("a.js")), Ok(2));
        assert!(state.artifacts().get("a.js").is_some());

        // A superseded cycle cannot replace newer output.
        assert!(state.publish(graph(1), artifacts("old.js")).is_err());
        assert!(state.artifacts().get("old.js").is_none());
        assert_eq!(state.version(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let state = DevServerState::new();
        let (_a, mut rx_a) = state.register_client();
        let (_b, mut rx_b) = state.register_client();

        let delivered = state.broadcast(&DevEvent::BuildStarted { cycle: 1 });
        assert_eq!(delivered, 2);
        for rx in [&mut rx_a, &mut rx_b] {
            let message = rx.recv().await.unwrap();
            assert!(message.contains("\"buildStarted\""));
        }
    }

    #[test]
    fn test_slow_and_closed_clients_are_dropped() {
        let state = DevServerState::new();
        let (_slow, _rx_slow) = state.register_client();
        let (_gone, rx_gone) = state.register_client();
        drop(rx_gone);

        for cycle in 0..CLIENT_QUEUE as u64 {
            state.broadcast(&DevEvent::BuildStarted { cycle });
        }
        assert_eq!(state.client_count(), 1);

        // The slow client's queue is now full.
        assert_eq!(state.broadcast(&DevEvent::BuildStarted { cycle: 99 }), 0);
        assert_eq!(state.client_count(), 0);
    }

    #[test]
    fn test_cycles_and_acks() {
        let state = DevServerState::new();
        assert_eq!(state.next_cycle(), 1);
        assert_eq!(state.next_cycle(), 2);
        state.acknowledge(2);
        state.acknowledge(1);
        assert_eq!(state.last_ack(), 2);

        let report = state.report();
        assert_eq!(report.status, "idle");
        assert_eq!(report.cycle, 2);
    }
}
