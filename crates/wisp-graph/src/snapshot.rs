//! Atomically swapped graph snapshots.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::graph::ModuleGraph;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot version {offered} is not newer than published version {current}")]
    Outdated { offered: u64, current: u64 },
}

/// Holds the latest completed graph.
///
/// Readers clone the `Arc` and keep a consistent view for as long as they
/// need it; publishing replaces the pointer and never touches a graph someone
/// may be reading.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<ModuleGraph>>,
}

impl SnapshotStore {
    pub fn new(graph: ModuleGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    pub fn load(&self) -> Arc<ModuleGraph> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    /// Swap in a newer graph. Versions must strictly increase, so a
    /// superseded rebuild can never overwrite the result of a later one.
    pub fn publish(&self, graph: ModuleGraph) -> Result<Arc<ModuleGraph>, SnapshotError> {
        let mut current = self.current.write();
        if graph.version() <= current.version() && !current.is_empty() {
            return Err(SnapshotError::Outdated {
                offered: graph.version(),
                current: current.version(),
            });
        }
        let graph = Arc::new(graph);
        *current = Arc::clone(&graph);
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Module, ModuleKind};
    use crate::module_id::ModuleId;

    fn versioned(version: u64) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        graph.add_module(
            Module::builder(ModuleId::new("/app/a.js").unwrap(), ModuleKind::Script).build(),
        );
        for _ in 0..version {
            graph.bump_version();
        }
        graph
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = SnapshotStore::new(versioned(1));
        let before = store.load();
        store.publish(versioned(2)).unwrap();

        assert_eq!(before.version(), 1);
        assert_eq!(store.load().version(), 2);
    }

    #[test]
    fn older_versions_are_rejected() {
        let store = SnapshotStore::new(versioned(3));
        assert_eq!(
            store.publish(versioned(2)).unwrap_err(),
            SnapshotError::Outdated {
                offered: 2,
                current: 3
            }
        );
    }
}
