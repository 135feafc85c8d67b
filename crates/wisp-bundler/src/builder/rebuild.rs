//! Partial rebuilds.
//!
//! Only the stale set is re-read and re-transformed. Imports that appear for
//! the first time are discovered and loaded, modules no entry reaches any more
//! are dropped, and the result is a new graph version. The base graph is never
//! touched, so an abandoned rebuild leaves nothing behind.

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::info;
use wisp_graph::{BuildState, Module, ModuleGraph, ModuleId};

use super::{GraphBuilder, cycle_warnings, entries_with_errors, set_state};
use crate::error::{BuildError, CycleWarning, Result};

#[derive(Debug)]
pub struct RebuildOutcome {
    pub graph: ModuleGraph,
    /// Stale modules that were transformed successfully, dependencies first.
    pub rebuilt: Vec<ModuleId>,
    /// Modules discovered for the first time, dependencies first.
    pub added: Vec<ModuleId>,
    pub removed: Vec<ModuleId>,
    pub errors: Vec<BuildError>,
    pub failed_entries: IndexSet<String>,
    pub warnings: Vec<CycleWarning>,
}

impl RebuildOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl GraphBuilder<'_> {
    /// Rebuild exactly `stale` on a copy of `base`.
    ///
    /// Returns `None` as soon as `cancelled` is set; a newer change set has
    /// superseded this one.
    pub fn rebuild(
        &self,
        base: &ModuleGraph,
        stale: &[ModuleId],
        cancelled: &AtomicBool,
    ) -> Option<RebuildOutcome> {
        let mut graph = base.clone();
        let mut errors = Vec::new();
        let stale: Vec<ModuleId> = stale
            .iter()
            .filter(|id| graph.contains(id))
            .cloned()
            .collect();

        for id in &stale {
            set_state(&mut graph, id, BuildState::mark_stale);
            set_state(&mut graph, id, BuildState::begin_rebuild);
        }

        let loaded: Vec<(ModuleId, Result<Module>)> = stale
            .par_iter()
            .map(|id| {
                let importer = if graph.is_entry(id) {
                    None
                } else {
                    graph.dependents(id).next().map(ModuleId::as_path)
                };
                let entry = graph.entries_reaching(id).first().copied().unwrap_or_default();
                (id.clone(), self.load(id, importer, entry))
            })
            .collect();
        if cancelled.load(Ordering::Acquire) {
            return None;
        }

        let mut rebuilt = Vec::new();
        for (id, result) in loaded {
            match result {
                Ok(mut module) => {
                    module.is_entry = graph.module(&id).is_some_and(|m| m.is_entry);
                    module.state = BuildState::Rebuilding;
                    graph.add_module(module);
                    set_state(&mut graph, &id, BuildState::complete);
                    rebuilt.push(id);
                }
                Err(err) => {
                    tracing::warn!(module = %id, error = %err, "rebuild failed");
                    errors.push(err);
                    set_state(&mut graph, &id, BuildState::fail);
                }
            }
        }

        let mut failed_entries: IndexSet<String> = IndexSet::new();
        self.discover_new(&mut graph, &rebuilt, &mut errors, cancelled)?;
        self.retry_missing_entries(&mut graph, &mut errors, &mut failed_entries);
        if cancelled.load(Ordering::Acquire) {
            return None;
        }

        let removed = graph.remove_unreachable();
        graph.clear_cycles();
        for cycle in graph.detect_cycles() {
            graph.record_cycle(cycle);
        }
        graph.bump_version();
        failed_entries.extend(entries_with_errors(&graph));

        let rebuilt_set: FxHashSet<&ModuleId> = rebuilt.iter().collect();
        let order = graph.topological_order();
        let added: Vec<ModuleId> = order
            .iter()
            .filter(|id| !base.contains(id))
            .cloned()
            .collect();
        let rebuilt: Vec<ModuleId> = order
            .iter()
            .filter(|id| rebuilt_set.contains(id))
            .cloned()
            .collect();
        let warnings = cycle_warnings(&graph);

        info!(
            version = graph.version(),
            rebuilt = rebuilt.len(),
            added = added.len(),
            removed = removed.len(),
            errors = errors.len(),
            "rebuild finished"
        );
        Some(RebuildOutcome {
            graph,
            rebuilt,
            added,
            removed,
            errors,
            failed_entries,
            warnings,
        })
    }

    /// Load imports of `roots` that the graph has never seen, level by level.
    fn discover_new(
        &self,
        graph: &mut ModuleGraph,
        roots: &[ModuleId],
        errors: &mut Vec<BuildError>,
        cancelled: &AtomicBool,
    ) -> Option<()> {
        let mut frontier: Vec<ModuleId> = roots.to_vec();
        while !frontier.is_empty() {
            if cancelled.load(Ordering::Acquire) {
                return None;
            }
            let mut missing: IndexSet<(ModuleId, ModuleId)> = IndexSet::new();
            for importer in &frontier {
                let Some(module) = graph.module(importer) else {
                    continue;
                };
                for dep in module.dependency_ids() {
                    if !graph.contains(dep) && !missing.iter().any(|(id, _)| id == dep) {
                        missing.insert((dep.clone(), importer.clone()));
                    }
                }
            }
            let missing: Vec<(ModuleId, ModuleId)> = missing.into_iter().collect();

            let loaded: Vec<(ModuleId, Result<Module>)> = missing
                .par_iter()
                .map(|(id, importer)| {
                    let entry = graph
                        .entries_reaching(importer)
                        .first()
                        .copied()
                        .unwrap_or_default();
                    (id.clone(), self.load(id, Some(importer.as_path()), entry))
                })
                .collect();
            frontier = loaded.iter().map(|(id, _)| id.clone()).collect();
            for (id, result) in loaded {
                self.insert_loaded(graph, id, result, errors);
            }
        }
        Some(())
    }

    /// Entries that failed to load before get another chance every cycle.
    fn retry_missing_entries(
        &self,
        graph: &mut ModuleGraph,
        errors: &mut Vec<BuildError>,
        failed_entries: &mut IndexSet<String>,
    ) {
        for (name, path) in &self.config.entry {
            if graph.entry_points().contains_key(name) {
                continue;
            }
            match self.add_entry(graph, name, path, errors) {
                Some(id) => self.discover(graph, name, &id, errors),
                None => {
                    failed_entries.insert(name.clone());
                }
            }
        }
    }
}
