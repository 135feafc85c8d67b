//! In-memory module graph.
//!
//! The graph is a plain value: the build path owns a mutable copy and
//! publishes finished versions through [`crate::SnapshotStore`]. Modules sit
//! behind `Arc`, so copying a graph for the next rebuild is shallow.

mod construction;
mod mutations;
mod traversal;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;

use crate::module::Module;
use crate::module_id::ModuleId;

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    version: u64,
    /// Discovery order.
    modules: IndexMap<ModuleId, Arc<Module>>,
    /// Reverse edges: module → modules importing it.
    dependents: FxHashMap<ModuleId, IndexSet<ModuleId>>,
    entry_points: IndexMap<String, ModuleId>,
    cycles: Vec<Vec<ModuleId>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic snapshot version. Zero until first published.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Arc<Module>> {
        self.modules.get(id)
    }

    /// All modules in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    /// Modules importing `id`, in the order the edges were added.
    pub fn dependents(&self, id: &ModuleId) -> impl Iterator<Item = &ModuleId> {
        self.dependents.get(id).into_iter().flatten()
    }

    /// Modules imported by `id`, in source order.
    pub fn dependencies(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.modules
            .get(id)
            .map(|m| m.dependency_ids().collect())
            .unwrap_or_default()
    }

    pub fn entry_points(&self) -> &IndexMap<String, ModuleId> {
        &self.entry_points
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.entry_points.values().any(|entry| entry == id)
    }

    /// Cycles found during the last build, each listed from the module that
    /// closes it.
    pub fn cycles(&self) -> &[Vec<ModuleId>] {
        &self.cycles
    }

    /// Every dependency edge as `(importer, imported)`.
    pub fn edges(&self) -> Vec<(ModuleId, ModuleId)> {
        self.modules
            .values()
            .flat_map(|m| m.dependency_ids().map(|d| (m.id.clone(), d.clone())))
            .collect()
    }
}
