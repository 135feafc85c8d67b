//! Module graph construction.
//!
//! [`GraphBuilder::build`] walks each entry point depth-first. Before the
//! walk descends into a module, all of that module's undiscovered imports are
//! read and transformed in parallel on the rayon pool; the walk itself stays
//! sequential, so a module's dependencies are resolved before it is left.
//!
//! A module that fails to load stays in the graph in the `Error` state with
//! its last good content, which lets the next rebuild retry it.

mod rebuild;

use std::path::Path;

use indexmap::IndexSet;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use wisp_config::WispConfig;
use wisp_graph::{
    Acceptance, BuildState, Dependency, Module, ModuleGraph, ModuleId, ModuleKind, Runtime,
    StateError,
};

use crate::error::{BuildError, CycleWarning, Result};
use crate::resolve::{Resolved, Resolver};
use crate::scan;
use crate::transform::TransformPipeline;

pub use rebuild::RebuildOutcome;

const EXTERNAL_PREFIX: &str = "external:";

/// Result of a full build. Errors are collected, never raised: one broken
/// entry does not stop its siblings.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: ModuleGraph,
    pub errors: Vec<BuildError>,
    /// Entries whose dependency tree contains a failed module.
    pub failed_entries: IndexSet<String>,
    pub warnings: Vec<CycleWarning>,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Borrowed view over everything needed to load modules.
pub struct GraphBuilder<'a> {
    pub(crate) config: &'a WispConfig,
    pub(crate) runtime: &'a dyn Runtime,
    pub(crate) pipeline: &'a TransformPipeline,
    pub(crate) resolver: &'a Resolver,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        config: &'a WispConfig,
        runtime: &'a dyn Runtime,
        pipeline: &'a TransformPipeline,
        resolver: &'a Resolver,
    ) -> Self {
        Self {
            config,
            runtime,
            pipeline,
            resolver,
        }
    }

    pub fn build(&self) -> BuildOutcome {
        let mut graph = ModuleGraph::new();
        let mut errors = Vec::new();
        let mut failed_entries = IndexSet::new();

        for (name, path) in &self.config.entry {
            match self.add_entry(&mut graph, name, path, &mut errors) {
                Some(id) => self.discover(&mut graph, name, &id, &mut errors),
                None => {
                    failed_entries.insert(name.clone());
                }
            }
        }

        failed_entries.extend(entries_with_errors(&graph));
        graph.bump_version();
        let warnings = cycle_warnings(&graph);
        info!(
            modules = graph.len(),
            entries = graph.entry_points().len(),
            errors = errors.len(),
            "build finished"
        );
        BuildOutcome {
            graph,
            errors,
            failed_entries,
            warnings,
        }
    }

    /// Resolve and load an entry module. Returns `None` when the entry path
    /// does not exist.
    fn add_entry(
        &self,
        graph: &mut ModuleGraph,
        name: &str,
        path: &Path,
        errors: &mut Vec<BuildError>,
    ) -> Option<ModuleId> {
        let absolute = self.config.resolve_path(path);
        let Some(resolved) = self.resolver.resolve_entry(self.runtime, &absolute) else {
            errors.push(BuildError::EntryNotFound {
                name: name.to_string(),
                path: absolute,
            });
            return None;
        };
        let id = match ModuleId::new(&resolved) {
            Ok(id) => id,
            Err(err) => {
                errors.push(BuildError::Transform {
                    path: resolved,
                    stage: "resolve",
                    message: err.to_string(),
                });
                return None;
            }
        };

        if !graph.contains(&id) {
            let result = self.load(&id, None, name);
            self.insert_loaded(graph, id.clone(), result, errors);
        }
        if let Some(module) = graph.module(&id) {
            if !module.is_entry {
                let mut module = Module::clone(module);
                module.is_entry = true;
                graph.add_module(module);
            }
        }
        graph.add_entry_point(name, id.clone());
        Some(id)
    }

    /// Depth-first walk from `root`, loading modules as they are reached.
    /// Edges back into the active resolution stack are recorded as cycles.
    fn discover(
        &self,
        graph: &mut ModuleGraph,
        entry: &str,
        root: &ModuleId,
        errors: &mut Vec<BuildError>,
    ) {
        let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
        let mut stack: Vec<(ModuleId, usize)> = vec![(root.clone(), 0)];
        visited.insert(root.clone());
        self.prefetch(graph, root, entry, errors);

        while let Some((current, next)) = stack.last().cloned() {
            let Some(module) = graph.module(&current).cloned() else {
                stack.pop();
                continue;
            };
            let Some(target) = module.dependency_ids().nth(next).cloned() else {
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            if let Some(position) = stack.iter().position(|(id, _)| *id == target) {
                let cycle: Vec<ModuleId> = stack[position..].iter().map(|(id, _)| id.clone()).collect();
                graph.record_cycle(cycle);
                continue;
            }
            if !visited.insert(target.clone()) {
                continue;
            }
            self.prefetch(graph, &target, entry, errors);
            stack.push((target, 0));
        }
    }

    /// Load every not-yet-discovered import of `importer` in parallel.
    fn prefetch(
        &self,
        graph: &mut ModuleGraph,
        importer: &ModuleId,
        entry: &str,
        errors: &mut Vec<BuildError>,
    ) {
        let Some(module) = graph.module(importer).cloned() else {
            return;
        };
        let missing: IndexSet<&ModuleId> = module
            .dependency_ids()
            .filter(|id| !graph.contains(id))
            .collect();
        if missing.is_empty() {
            return;
        }
        let missing: Vec<&ModuleId> = missing.into_iter().collect();

        let loaded: Vec<(ModuleId, Result<Module>)> = missing
            .par_iter()
            .map(|&id| (id.clone(), self.load(id, Some(importer.as_path()), entry)))
            .collect();
        for (id, result) in loaded {
            self.insert_loaded(graph, id, result, errors);
        }
    }

    /// Add a freshly discovered module, or an `Error` placeholder when it
    /// failed to load.
    pub(crate) fn insert_loaded(
        &self,
        graph: &mut ModuleGraph,
        id: ModuleId,
        result: Result<Module>,
        errors: &mut Vec<BuildError>,
    ) {
        match result {
            Ok(module) => {
                graph.add_module(module);
                set_state(graph, &id, BuildState::complete);
            }
            Err(err) => {
                warn!(module = %id, error = %err, "module failed to load");
                errors.push(err);
                graph.add_module(Module::builder(id.clone(), ModuleKind::Script).build());
                set_state(graph, &id, BuildState::fail);
            }
        }
    }

    /// Read, transform and scan one module and resolve its imports.
    ///
    /// The returned module is `Unbuilt`; callers move it through the state
    /// machine as they insert it.
    pub(crate) fn load(&self, id: &ModuleId, importer: Option<&Path>, entry: &str) -> Result<Module> {
        if id.is_virtual() {
            return self.external_module(id).ok_or_else(|| BuildError::ModuleNotFound {
                specifier: id.path_string().into_owned(),
                importer: importer.map(Path::to_path_buf).unwrap_or_default(),
                entry: entry.to_string(),
            });
        }

        let path = id.as_path();
        let raw = self.runtime.read_file(path)?;
        let output = self.pipeline.transform(path, &raw, importer)?;
        let scanned = scan::scan(&output.code);

        let mut dependencies = Vec::with_capacity(scanned.specifiers.len());
        for specifier in &scanned.specifiers {
            let target = self.resolve_dependency(specifier, path).ok_or_else(|| {
                BuildError::ModuleNotFound {
                    specifier: specifier.clone(),
                    importer: path.to_path_buf(),
                    entry: entry.to_string(),
                }
            })?;
            dependencies.push(Dependency {
                specifier: specifier.clone(),
                target,
            });
        }

        let mut acceptance = Acceptance {
            self_accepting: scanned.self_accepting,
            ..Acceptance::default()
        };
        for specifier in &scanned.accepted {
            let target = dependencies
                .iter()
                .find(|dep| &dep.specifier == specifier)
                .map(|dep| dep.target.clone())
                .or_else(|| self.resolve_dependency(specifier, path));
            if let Some(target) = target {
                acceptance.dependencies.insert(target);
            }
        }

        debug!(
            module = %id,
            dependencies = dependencies.len(),
            "loaded module"
        );
        Ok(Module::builder(id.clone(), output.kind)
            .raw(raw)
            .code(output.code)
            .dependencies(dependencies)
            .acceptance(acceptance)
            .style(output.style)
            .emitted(output.emitted)
            .build())
    }

    fn resolve_dependency(&self, specifier: &str, importer: &Path) -> Option<ModuleId> {
        match self.resolver.resolve(self.runtime, specifier, importer)? {
            Resolved::File(path) => ModuleId::new(path).ok(),
            Resolved::External { specifier, .. } => {
                Some(ModuleId::new_virtual(format!("{EXTERNAL_PREFIX}{specifier}")))
            }
        }
    }

    fn external_module(&self, id: &ModuleId) -> Option<Module> {
        let name = id.path_string();
        let specifier = name.strip_prefix("virtual:")?.strip_prefix(EXTERNAL_PREFIX)?;
        let global = self.resolver.external_global(specifier)?;
        let code = format!(
            "module.exports = globalThis[{}];\n",
            serde_json::Value::String(global.to_string())
        );
        Some(Module::builder(id.clone(), ModuleKind::External).code(code).build())
    }
}

/// Apply a state transition that the build path expects to be valid.
pub(crate) fn set_state(
    graph: &mut ModuleGraph,
    id: &ModuleId,
    step: impl FnOnce(BuildState) -> std::result::Result<BuildState, StateError>,
) {
    if let Err(err) = graph.transition(id, step) {
        warn!(module = %id, error = %err, "unexpected build state");
    }
}

/// Entry names whose reachable modules include one in the `Error` state.
pub(crate) fn entries_with_errors(graph: &ModuleGraph) -> Vec<String> {
    graph
        .entry_points()
        .iter()
        .filter(|(_, entry)| {
            graph
                .reachable_from(entry)
                .iter()
                .any(|id| graph.state(id) == Some(BuildState::Error))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

pub(crate) fn cycle_warnings(graph: &ModuleGraph) -> Vec<CycleWarning> {
    graph
        .cycles()
        .iter()
        .map(|cycle| {
            let warning = CycleWarning {
                cycle: cycle.clone(),
            };
            warn!("{warning}");
            warning
        })
        .collect()
}
