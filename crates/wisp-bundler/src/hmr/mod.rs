//! Hot module replacement planning.
//!
//! [`plan_update`] decides which modules a change makes stale. Staleness
//! bubbles from each changed module to its importers until it reaches a
//! module that accepts the update: either a self-accepting module, or an
//! importer whose acceptance set names the module. Reaching an entry point
//! that accepts nothing means the client has to reload the page.
//!
//! After the stale set is rebuilt, [`batch`] turns the result into one
//! [`HmrBatch`], the unit the client applies atomically.

pub mod client;

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use wisp_graph::{ModuleGraph, ModuleId, StyleResource};

use crate::chunk::{ModuleNaming, module_definition};

pub use client::{ClientOutcome, HmrClient};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HmrPlan {
    /// Modules to rebuild, dependencies first.
    pub stale: Vec<ModuleId>,
    /// Update boundaries: accepted module -> modules accepting it.
    pub accepted_by: IndexMap<ModuleId, Vec<ModuleId>>,
    /// Some change bubbled to an entry point without being accepted.
    pub full_reload: bool,
}

impl HmrPlan {
    pub fn accepters(&self, id: &ModuleId) -> &[ModuleId] {
        self.accepted_by.get(id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Work out the stale set for a batch of changed modules.
///
/// Ids not in the graph are ignored.
pub fn plan_update(graph: &ModuleGraph, changed: &[ModuleId]) -> HmrPlan {
    let mut stale: IndexSet<ModuleId> = IndexSet::new();
    let mut accepted_by: IndexMap<ModuleId, Vec<ModuleId>> = IndexMap::new();
    let mut full_reload = false;

    let mut queue: VecDeque<ModuleId> = changed
        .iter()
        .filter(|id| graph.contains(id))
        .cloned()
        .collect();

    while let Some(id) = queue.pop_front() {
        if !stale.insert(id.clone()) {
            continue;
        }
        let Some(module) = graph.module(&id) else {
            continue;
        };
        if module.acceptance.self_accepting {
            push_unique(accepted_by.entry(id.clone()).or_default(), id.clone());
            continue;
        }
        if graph.is_entry(&id) {
            full_reload = true;
            continue;
        }
        for dependent in graph.dependents(&id) {
            let accepts = graph
                .module(dependent)
                .is_some_and(|m| m.acceptance.accepts(&id));
            if accepts {
                push_unique(accepted_by.entry(id.clone()).or_default(), dependent.clone());
            } else {
                queue.push_back(dependent.clone());
            }
        }
    }

    let stale = graph
        .topological_order()
        .into_iter()
        .filter(|id| stale.contains(id))
        .collect();
    HmrPlan {
        stale,
        accepted_by,
        full_reload,
    }
}

fn push_unique(list: &mut Vec<ModuleId>, id: ModuleId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// One module's new definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrUpdate {
    pub module_path: String,
    /// The module's registry definition, ready to evaluate.
    pub content: String,
    pub fingerprint: String,
    /// Modules whose acceptance absorbs this update. Empty for modules that
    /// are only re-defined and re-run through a boundary.
    pub accepted_by: Vec<String>,
}

/// Everything one rebuild cycle changed, applied by clients as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrBatch {
    pub cycle: u64,
    pub version: u64,
    pub full_reload: bool,
    /// Dependencies before dependents.
    pub updates: Vec<HmrUpdate>,
    pub styles: Vec<StyleResource>,
}

impl HmrBatch {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.styles.is_empty()
    }
}

/// Build the batch for `modules` (dependencies first) out of the rebuilt
/// graph.
pub fn batch(
    graph: &ModuleGraph,
    plan: &HmrPlan,
    modules: &[ModuleId],
    naming: &ModuleNaming,
    cycle: u64,
) -> HmrBatch {
    let mut updates = Vec::with_capacity(modules.len());
    let mut styles = Vec::new();
    for id in modules {
        let Some(module) = graph.module(id) else {
            continue;
        };
        updates.push(HmrUpdate {
            module_path: naming.name(id),
            content: module_definition(module, naming),
            fingerprint: module.fingerprint.to_hex(),
            accepted_by: plan.accepters(id).iter().map(|a| naming.name(a)).collect(),
        });
        if let Some(style) = &module.style {
            styles.push(style.clone());
        }
    }
    HmrBatch {
        cycle,
        version: graph.version(),
        full_reload: plan.full_reload,
        updates,
        styles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_graph::{BuildState, Module, ModuleKind};

    fn id(name: &str) -> ModuleId {
        ModuleId::new(format!("/app/{name}.js")).unwrap()
    }

    struct Fixture<'a> {
        name: &'a str,
        deps: &'a [&'a str],
        accepts: &'a [&'a str],
        self_accepting: bool,
    }

    fn module(name: &'static str, deps: &'static [&'static str]) -> Fixture<'static> {
        Fixture {
            name,
            deps,
            accepts: &[],
            self_accepting: false,
        }
    }

    fn graph(fixtures: &[Fixture<'_>], entry: &str) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        for fixture in fixtures {
            let mut builder = Module::builder(id(fixture.name), ModuleKind::Script)
                .code(format!("/* {} */", fixture.name))
                .state(BuildState::Built)
                .self_accepting(fixture.self_accepting);
            for dep in fixture.deps {
                builder = builder.dependency(format!("./{dep}"), id(dep));
            }
            for accepted in fixture.accepts {
                builder = builder.accepts(id(accepted));
            }
            graph.add_module(builder.build());
        }
        graph.add_entry_point("main", id(entry));
        graph
    }

    #[test]
    fn accepted_change_touches_only_the_changed_module() {
        let graph = graph(
            &[
                module("main", &["b"]),
                Fixture {
                    accepts: &["a"],
                    ..module("b", &["a"])
                },
                module("a", &[]),
            ],
            "main",
        );
        let plan = plan_update(&graph, &[id("a")]);
        assert_eq!(plan.stale, vec![id("a")]);
        assert!(!plan.full_reload);
        assert_eq!(plan.accepters(&id("a")), [id("b")]);
        assert!(plan.accepters(&id("b")).is_empty());
    }

    #[test]
    fn unaccepted_change_bubbles_to_the_entry() {
        let graph = graph(
            &[module("main", &["b"]), module("b", &["a"]), module("a", &[])],
            "main",
        );
        let plan = plan_update(&graph, &[id("a")]);
        assert_eq!(plan.stale, vec![id("a"), id("b"), id("main")]);
        assert!(plan.full_reload);
        assert!(plan.accepted_by.is_empty());
    }

    #[test]
    fn self_accepting_module_is_its_own_boundary() {
        let graph = graph(
            &[
                module("main", &["view"]),
                Fixture {
                    self_accepting: true,
                    ..module("view", &["util"])
                },
                module("util", &[]),
            ],
            "main",
        );
        let plan = plan_update(&graph, &[id("util")]);
        assert_eq!(plan.stale, vec![id("util"), id("view")]);
        assert_eq!(plan.accepters(&id("view")), [id("view")]);
        assert!(!plan.full_reload);
    }

    #[test]
    fn one_unaccepted_path_forces_a_reload() {
        // shared is imported by an accepting module and by the entry directly.
        let graph = graph(
            &[
                module("main", &["panel", "shared"]),
                Fixture {
                    accepts: &["shared"],
                    ..module("panel", &["shared"])
                },
                module("shared", &[]),
            ],
            "main",
        );
        let plan = plan_update(&graph, &[id("shared")]);
        assert!(plan.full_reload);
        assert_eq!(plan.accepters(&id("shared")), [id("panel")]);
        assert_eq!(plan.stale, vec![id("shared"), id("main")]);
    }

    #[test]
    fn unknown_modules_are_ignored() {
        let graph = graph(&[module("main", &[])], "main");
        assert_eq!(plan_update(&graph, &[id("elsewhere")]), HmrPlan::default());
    }

    #[test]
    fn batch_lists_updates_in_dependency_order() {
        let graph = graph(
            &[
                module("main", &["view"]),
                Fixture {
                    self_accepting: true,
                    ..module("view", &["util"])
                },
                module("util", &[]),
            ],
            "main",
        );
        let plan = plan_update(&graph, &[id("util")]);
        let naming = ModuleNaming::relative("/app");
        let batch = batch(&graph, &plan, &plan.stale, &naming, 7);

        assert_eq!(batch.cycle, 7);
        assert!(!batch.full_reload);
        let paths: Vec<&str> = batch.updates.iter().map(|u| u.module_path.as_str()).collect();
        assert_eq!(paths, ["./util.js", "./view.js"]);
        assert!(batch.updates[0].accepted_by.is_empty());
        assert_eq!(batch.updates[1].accepted_by, ["./view.js"]);
        assert!(batch.updates[1].content.starts_with("__wisp__.define(\"./view.js\""));

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["updates"][1]["modulePath"], "./view.js");
        assert_eq!(json["fullReload"], false);
    }
}
